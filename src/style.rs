//! Style configuration: the single immutable input threaded through every
//! component. Split into a full [`Style`] plus an `Option`-wrapped
//! [`PartialStyle`] counterpart that can be deserialized from TOML and
//! merged field-by-field over a baseline.

use serde::{Deserialize, Serialize};

trait Merge {
    type Partial;
    fn merge(&mut self, other: Self::Partial);
}

macro_rules! identity_merge {
    ($($t:ty),*$(,)?) => {
        $(
            impl Merge for $t {
                type Partial = Self;
                fn merge(&mut self, other: Self) {
                    *self = other;
                }
            }
        )*
    };
}

macro_rules! create_normal_and_partial {
    ($(struct $name:ident | $partial_name:ident {$(pub $member:ident: $member_type:ty,)*})*) => {
        $(
            #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
            pub struct $name {
                $(
                    pub $member: $member_type,
                )*
            }

            #[derive(Deserialize, Debug, Default)]
            pub struct $partial_name {
                $(
                    pub $member: Option<<$member_type as Merge>::Partial>,
                )*
            }

            impl Merge for $name {
                type Partial = $partial_name;
                fn merge(&mut self, other: $partial_name) {
                    $(
                        if let Some(value) = other.$member {
                            self.$member.merge(value);
                        }
                    )*
                }
            }
        )*
    };
}

identity_merge!(usize);

create_normal_and_partial!(
    struct AlignmentStyle | PartialAlignmentStyle {
        pub infer_margin: usize,
        pub dominance_margin: usize,
    }

    struct Style | PartialStyle {
        pub indentation_spaces: usize,
        pub wrap_spaces: usize,
        pub column_limit: usize,
        pub over_column_limit_penalty: usize,
        pub line_break_penalty: usize,
        pub max_search_states: usize,
        pub alignment: AlignmentStyle,
    }
);

impl Style {
    /// A compact house style: two-space indentation, one-line-if-it-fits.
    pub fn default_style() -> Self {
        Self {
            indentation_spaces: 2,
            wrap_spaces: 4,
            column_limit: 100,
            over_column_limit_penalty: 50,
            line_break_penalty: 2,
            max_search_states: 10_000,
            alignment: AlignmentStyle { infer_margin: 2, dominance_margin: 4 },
        }
    }

    /// A baseline that prefers one construct per line over packing.
    pub fn expanded_style() -> Self {
        Self {
            indentation_spaces: 4,
            wrap_spaces: 4,
            column_limit: 80,
            over_column_limit_penalty: 50,
            line_break_penalty: 1,
            max_search_states: 10_000,
            alignment: AlignmentStyle { infer_margin: 2, dominance_margin: 4 },
        }
    }

    /// Merges a TOML document's overrides onto this style in place.
    pub fn merge_toml(&mut self, data: &str) -> Result<(), toml::de::Error> {
        let partial: PartialStyle = toml::from_str(data)?;
        Merge::merge(self, partial);
        Ok(())
    }

    /// Serializes this style back to TOML, for snapshotting an effective
    /// configuration alongside a formatting run's output.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Style {
    fn default() -> Self {
        Self::default_style()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_overrides_only_named_fields() {
        let mut style = Style::default_style();
        style
            .merge_toml("column_limit = 120\n[alignment]\ninfer_margin = 3\n")
            .expect("valid TOML");
        assert_eq!(style.column_limit, 120);
        assert_eq!(style.alignment.infer_margin, 3);
        assert_eq!(style.indentation_spaces, 2, "unmentioned fields keep the baseline value");
    }

    #[test]
    fn round_trips_through_toml() {
        let style = Style::expanded_style();
        let text = style.to_toml().expect("serializable");
        let mut restored = Style::default_style();
        restored.merge_toml(&text).expect("round-trip is valid TOML");
        assert_eq!(restored, style);
    }

    #[test]
    fn baselines_differ() {
        assert_ne!(Style::default_style(), Style::expanded_style());
    }
}
