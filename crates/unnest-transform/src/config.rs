//! Backend configuration consumed by the pass

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Target language family the transformed IR is headed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    C,
    Java,
    #[serde(rename = "csharp")]
    CSharp,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::C => "c",
            Target::Java => "java",
            Target::CSharp => "csharp",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "c" => Ok(Target::C),
            "java" => Ok(Target::Java),
            "csharp" | "c#" => Ok(Target::CSharp),
            other => Err(format!("unknown target `{}`", other)),
        }
    }
}

/// Properties of the backend that change the shape of generated records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Environment records must be heap allocated
    pub on_heap: bool,
    /// The target's class types are already references, so the
    /// environment pointer type is the record type itself
    pub pointer_is_reference: bool,
    /// A partial struct initializer zeroes the remaining fields
    pub implicit_zero_init: bool,
}

impl TargetConfig {
    /// Preset for a target
    pub fn for_target(target: Target) -> Self {
        match target {
            Target::C => Self {
                on_heap: false,
                pointer_is_reference: false,
                implicit_zero_init: true,
            },
            Target::Java | Target::CSharp => Self {
                on_heap: true,
                pointer_is_reference: true,
                implicit_zero_init: true,
            },
        }
    }

    /// Apply the settings present in `overrides`
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(on_heap) = overrides.on_heap {
            self.on_heap = on_heap;
        }
        if let Some(pointer_is_reference) = overrides.pointer_is_reference {
            self.pointer_is_reference = pointer_is_reference;
        }
        if let Some(implicit_zero_init) = overrides.implicit_zero_init {
            self.implicit_zero_init = implicit_zero_init;
        }
        self
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self::for_target(Target::C)
    }
}

/// Contents of a configuration file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    /// Preset to start from, if the command line does not name one
    pub target: Option<Target>,
    pub on_heap: Option<bool>,
    pub pointer_is_reference: Option<bool>,
    pub implicit_zero_init: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let c = TargetConfig::for_target(Target::C);
        assert!(!c.on_heap);
        assert!(!c.pointer_is_reference);

        let java = TargetConfig::for_target(Target::Java);
        assert!(java.on_heap);
        assert!(java.pointer_is_reference);
        assert_eq!(java, TargetConfig::for_target(Target::CSharp));
    }

    #[test]
    fn test_parse_target() {
        assert_eq!("C".parse::<Target>(), Ok(Target::C));
        assert_eq!("c#".parse::<Target>(), Ok(Target::CSharp));
        assert!("cobol".parse::<Target>().is_err());
    }

    #[test]
    fn test_overrides_from_toml() {
        let overrides: ConfigOverrides = toml::from_str(
            r#"
            target = "csharp"
            implicit_zero_init = false
            "#,
        )
        .unwrap();
        assert_eq!(overrides.target, Some(Target::CSharp));

        let config = TargetConfig::for_target(Target::C).with_overrides(&overrides);
        assert!(!config.on_heap);
        assert!(!config.implicit_zero_init);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<ConfigOverrides>("on_stack = true").is_err());
    }
}
