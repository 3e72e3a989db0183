// Decode limits and policy knobs, with environment overrides for the CLI.
use crate::core::error::{Error, ErrorKind};

/// Same nesting limit serde_json applies while parsing text.
pub const DEFAULT_MAX_DEPTH: usize = 128;

pub const ENV_MAX_DEPTH: &str = "JSONABLE_MAX_DEPTH";
pub const ENV_STRICT_ENUMS: &str = "JSONABLE_STRICT_ENUMS";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecodeOptions {
    /// Maximum record nesting, counting the root as depth 1.
    pub max_depth: usize,
    /// Reject enum codes that are not declared members.
    pub strict_enums: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_enums: false,
        }
    }
}

impl DecodeOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Result<Self, Error> {
        if max_depth == 0 {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("max depth must be at least 1")
                .with_hint("The root record itself counts as depth 1."));
        }
        self.max_depth = max_depth;
        Ok(self)
    }

    pub fn with_strict_enums(mut self, strict: bool) -> Self {
        self.strict_enums = strict;
        self
    }

    /// Defaults overlaid with `JSONABLE_MAX_DEPTH` / `JSONABLE_STRICT_ENUMS`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();
        if let Some(raw) = lookup(ENV_MAX_DEPTH) {
            let depth = raw.trim().parse::<usize>().map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid {ENV_MAX_DEPTH} value `{raw}`"))
                    .with_hint("Use a positive integer.")
                    .with_source(err)
            })?;
            options = options.with_max_depth(depth)?;
        }
        if let Some(raw) = lookup(ENV_STRICT_ENUMS) {
            options.strict_enums = parse_flag(&raw).ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("invalid {ENV_STRICT_ENUMS} value `{raw}`"))
                    .with_hint("Use 1/true/yes or 0/false/no.")
            })?;
        }
        Ok(options)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_MAX_DEPTH, DecodeOptions, ENV_MAX_DEPTH, ENV_STRICT_ENUMS};
    use crate::core::error::ErrorKind;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn defaults_are_permissive() {
        let options = DecodeOptions::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(options, DecodeOptions::default());
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert!(!options.strict_enums);
    }

    #[test]
    fn env_overrides_apply() {
        let options =
            DecodeOptions::from_lookup(lookup(&[(ENV_MAX_DEPTH, "8"), (ENV_STRICT_ENUMS, "yes")]))
                .expect("valid env");
        assert_eq!(options.max_depth, 8);
        assert!(options.strict_enums);
    }

    #[test]
    fn invalid_env_values_are_usage_errors() {
        let err = DecodeOptions::from_lookup(lookup(&[(ENV_MAX_DEPTH, "deep")]))
            .expect_err("not a number");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err =
            DecodeOptions::from_lookup(lookup(&[(ENV_MAX_DEPTH, "0")])).expect_err("zero depth");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let err = DecodeOptions::from_lookup(lookup(&[(ENV_STRICT_ENUMS, "maybe")]))
            .expect_err("bad flag");
        assert!(err.to_string().contains(ENV_STRICT_ENUMS));
    }
}
