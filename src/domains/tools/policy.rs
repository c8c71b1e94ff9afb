//! Registration policy.
//!
//! Decides, from startup feature flags, which tool groups end up in the
//! registry. The general group is always registered; every optional group
//! is tied to one environment flag. Two enabled groups declaring the same
//! tool name abort startup.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::definitions::{
    ToolContext, ToolGroup, bitcoin, cross_chain, ethereum, general, ripple, solana, ton,
};
use super::error::ToolError;
use super::registry::ToolRegistry;
use crate::core::error::{Error, Result};

pub const SOLANA_FLAG: &str = "ENABLE_SOLANA_TOOLS";
pub const ETHEREUM_FLAG: &str = "ENABLE_ETHEREUM_TOOLS";
pub const BITCOIN_FLAG: &str = "ENABLE_BITCOIN_TOOLS";
pub const RIPPLE_FLAG: &str = "ENABLE_RIPPLE_TOOLS";
pub const TON_FLAG: &str = "ENABLE_TON_TOOLS";
pub const CROSS_CHAIN_FLAG: &str = "ENABLE_CROSS_CHAIN_TOOLS";

/// Every recognised flag, in declaration order.
pub const KNOWN_FLAGS: [&str; 6] = [
    SOLANA_FLAG,
    ETHEREUM_FLAG,
    BITCOIN_FLAG,
    RIPPLE_FLAG,
    TON_FLAG,
    CROSS_CHAIN_FLAG,
];

/// Flag truthiness: `true`, `1` or `yes`, case-insensitive. Anything else,
/// including an absent variable, is false.
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        let v = v.trim();
        v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes")
    })
}

/// Boolean feature flags, read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags {
    flags: BTreeMap<String, bool>,
}

impl FeatureFlags {
    /// Read every known flag from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Read every known flag through `lookup`.
    pub fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let flags = KNOWN_FLAGS
            .iter()
            .map(|flag| (flag.to_string(), parse_flag(lookup(flag).as_deref())))
            .collect();
        Self { flags }
    }

    /// Build flags from raw `(name, value)` pairs. Later pairs win.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let flags = pairs
            .into_iter()
            .map(|(name, value)| (name.to_string(), parse_flag(Some(value))))
            .collect();
        Self { flags }
    }

    /// Whether `flag` is on.
    pub fn is_enabled(&self, flag: &str) -> bool {
        self.flags.get(flag).copied().unwrap_or(false)
    }

    /// Names of the enabled flags, sorted.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.flags
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }
}

/// Builds a tool group from the shared context.
pub type GroupProvider = fn(&Arc<ToolContext>) -> ToolGroup;

/// An optional group and the flag that enables it.
#[derive(Debug, Clone, Copy)]
pub struct GroupEntry {
    pub flag: &'static str,
    pub provider: GroupProvider,
}

/// Optional groups, in registration order.
pub const OPTIONAL_GROUPS: &[GroupEntry] = &[
    GroupEntry {
        flag: SOLANA_FLAG,
        provider: solana::group,
    },
    GroupEntry {
        flag: ETHEREUM_FLAG,
        provider: ethereum::group,
    },
    GroupEntry {
        flag: BITCOIN_FLAG,
        provider: bitcoin::group,
    },
    GroupEntry {
        flag: RIPPLE_FLAG,
        provider: ripple::group,
    },
    GroupEntry {
        flag: TON_FLAG,
        provider: ton::group,
    },
    GroupEntry {
        flag: CROSS_CHAIN_FLAG,
        provider: cross_chain::group,
    },
];

fn register_group(registry: &mut ToolRegistry, group: ToolGroup) -> Result<()> {
    let name = group.name;
    let count = group.tools.len();
    for descriptor in group.tools {
        registry.register(descriptor).map_err(|e| match e {
            ToolError::Duplicate(tool) => Error::config(format!(
                "tool '{tool}' from group '{name}' is already registered by another group"
            )),
            other => Error::from(other),
        })?;
    }
    debug!("Registered group {} ({} tools)", name, count);
    Ok(())
}

/// Register every group in `table` whose flag is enabled.
///
/// A name collision between groups is a configuration error.
pub fn apply(
    flags: &FeatureFlags,
    table: &[GroupEntry],
    ctx: &Arc<ToolContext>,
    registry: &mut ToolRegistry,
) -> Result<()> {
    for entry in table.iter().filter(|e| flags.is_enabled(e.flag)) {
        register_group(registry, (entry.provider)(ctx))?;
    }
    Ok(())
}

/// Build the startup registry: the general group plus every enabled
/// optional group.
pub fn build_registry(ctx: &Arc<ToolContext>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_group(&mut registry, general::group(ctx))?;
    apply(&ctx.config.features, OPTIONAL_GROUPS, ctx, &mut registry)?;

    info!(
        "Tool registry ready: {} tools ({})",
        registry.len(),
        registry.tool_names().join(", ")
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::domains::tools::registry::ToolDescriptor;
    use crate::domains::tools::registry::tests::StubBalanceTool;

    fn context(flags: FeatureFlags) -> Arc<ToolContext> {
        let config = Config {
            features: flags,
            ..Config::default()
        };
        Arc::new(ToolContext::new(Arc::new(config)).unwrap())
    }

    fn group_x_first(_: &Arc<ToolContext>) -> ToolGroup {
        ToolGroup::new("first").with(ToolDescriptor::typed(StubBalanceTool::named("x")))
    }

    fn group_x_second(_: &Arc<ToolContext>) -> ToolGroup {
        ToolGroup::new("second").with(ToolDescriptor::typed(StubBalanceTool::named("x")))
    }

    #[test]
    fn test_parse_flag() {
        for value in ["true", "TRUE", "1", "yes", "Yes", " true "] {
            assert!(parse_flag(Some(value)), "{value} should be truthy");
        }
        for value in ["false", "0", "no", "on", "", "2"] {
            assert!(!parse_flag(Some(value)), "{value} should be falsy");
        }
        assert!(!parse_flag(None));
    }

    #[test]
    fn test_from_lookup_reads_known_flags_only() {
        let lookup = |key: &str| match key {
            SOLANA_FLAG => Some("yes".to_string()),
            "ENABLE_POLKADOT_TOOLS" => Some("true".to_string()),
            _ => None,
        };
        let flags = FeatureFlags::from_lookup(&lookup);
        assert!(flags.is_enabled(SOLANA_FLAG));
        assert!(!flags.is_enabled("ENABLE_POLKADOT_TOOLS"));
        assert_eq!(flags.enabled().collect::<Vec<_>>(), vec![SOLANA_FLAG]);
    }

    #[test]
    fn test_general_group_always_registered() {
        let registry = build_registry(&context(FeatureFlags::default())).unwrap();
        assert_eq!(
            registry.tool_names(),
            vec!["convert_units", "get_server_info", "list_supported_chains"]
        );
    }

    #[test]
    fn test_registry_is_union_of_enabled_groups() {
        let ctx = context(FeatureFlags::from_pairs([(SOLANA_FLAG, "true"), (TON_FLAG, "1")]));
        let registry = build_registry(&ctx).unwrap();

        let mut expected = general::group(&ctx).names();
        expected.extend(solana::group(&ctx).names());
        expected.extend(ton::group(&ctx).names());
        expected.sort_unstable();

        assert_eq!(registry.tool_names(), expected);
        assert!(!registry.contains("eth_get_balance"));
    }

    #[test]
    fn test_all_groups_have_distinct_names() {
        let flags = FeatureFlags::from_pairs(KNOWN_FLAGS.iter().map(|f| (*f, "true")));
        let registry = build_registry(&context(flags)).unwrap();
        assert_eq!(registry.len(), 3 + 3 + 4 + 5 + 2 + 2 + 2);
    }

    #[test]
    fn test_order_and_repetition_do_not_change_result() {
        let flags = FeatureFlags::from_pairs([
            (ETHEREUM_FLAG, "yes"),
            (RIPPLE_FLAG, "true"),
            (ETHEREUM_FLAG, "TRUE"),
        ]);
        let ctx = context(flags.clone());

        let mut forward = ToolRegistry::new();
        apply(&flags, OPTIONAL_GROUPS, &ctx, &mut forward).unwrap();

        let reversed_table: Vec<GroupEntry> = OPTIONAL_GROUPS.iter().rev().copied().collect();
        let mut backward = ToolRegistry::new();
        apply(&flags, &reversed_table, &ctx, &mut backward).unwrap();

        assert_eq!(forward.tool_names(), backward.tool_names());
        assert_eq!(forward.len(), 6);
    }

    #[test]
    fn test_duplicate_across_groups_is_configuration_error() {
        let table = [
            GroupEntry {
        flag: SOLANA_FLAG,
        provider: group_x_first,
    },
            GroupEntry {
        flag: TON_FLAG,
        provider: group_x_second,
    },
        ];
        let flags = FeatureFlags::from_pairs([(SOLANA_FLAG, "true"), (TON_FLAG, "true")]);
        let ctx = context(flags.clone());

        let mut registry = ToolRegistry::new();
        let err = apply(&flags, &table, &ctx, &mut registry).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_disabled_duplicate_is_harmless() {
        let table = [
            GroupEntry {
        flag: SOLANA_FLAG,
        provider: group_x_first,
    },
            GroupEntry {
        flag: TON_FLAG,
        provider: group_x_second,
    },
        ];
        let flags = FeatureFlags::from_pairs([(SOLANA_FLAG, "true")]);
        let ctx = context(flags.clone());

        let mut registry = ToolRegistry::new();
        apply(&flags, &table, &ctx, &mut registry).unwrap();
        assert_eq!(registry.tool_names(), vec!["x"]);
    }
}
