use std::collections::HashSet;

use thiserror::Error;

use super::{DispatchTable, Plugin, PluginHandle, Priority};

/// Raised when a plugin's `startup_info()` fails validation (§4.D). Fatal
/// at session init.
#[derive(Debug, Error)]
pub enum PluginRegistryError {
    /// `priorities` named a method the plugin has no handler for.
    #[error("plugin {plugin} declares a priority for {method:?}, which is not in its methods list")]
    PriorityForAbsentHandler {
        /// The offending plugin's name.
        plugin: String,
        /// The method with no corresponding handler.
        method: &'static str,
    },
    /// `name` was empty.
    #[error("plugin has an empty name")]
    EmptyName,
}

/// Validate every plugin's `startup_info()` (§4.D). Fatal if any fails:
/// every key in `priorities` must also be in `methods`, and `name` must be
/// non-empty.
pub fn validate_plugins(plugins: &[PluginHandle]) -> Result<(), PluginRegistryError> {
    for plugin in plugins {
        let info = plugin.startup_info();
        if info.name.is_empty() {
            return Err(PluginRegistryError::EmptyName);
        }
        let methods: HashSet<&'static str> = info.methods.iter().copied().collect();
        for method in info.priorities.keys() {
            if !methods.contains(method) {
                return Err(PluginRegistryError::PriorityForAbsentHandler {
                    plugin: info.name.clone(),
                    method,
                });
            }
        }
    }
    Ok(())
}

/// Build a session's dispatch table (§4.D):
/// 1. Discard plugins whose `relevant_repos` excludes `monorepo`, or whose
///    enablement is `false`.
/// 2. Bucket survivors by priority, per method.
/// 3. Concatenate `High` then `Regular` into `sync`; `Async` becomes
///    `async`. Order within a bucket is supply order.
pub fn build_dispatch_table(
    plugins: &[PluginHandle],
    enablement: &std::collections::HashMap<String, bool>,
    monorepo: &str,
) -> DispatchTable {
    let mut high: std::collections::HashMap<&'static str, Vec<PluginHandle>> =
        std::collections::HashMap::new();
    let mut regular: std::collections::HashMap<&'static str, Vec<PluginHandle>> =
        std::collections::HashMap::new();
    let mut async_bucket: std::collections::HashMap<&'static str, Vec<PluginHandle>> =
        std::collections::HashMap::new();

    for plugin in plugins {
        let info = plugin.startup_info();

        if let Some(repos) = &info.relevant_repos {
            if !repos.iter().any(|r| r == monorepo) {
                continue;
            }
        }
        if enablement.get(&info.name).copied() == Some(false) {
            continue;
        }

        for (method, priority) in &info.priorities {
            let bucket = match priority {
                Priority::High => &mut high,
                Priority::Regular => &mut regular,
                Priority::Async => &mut async_bucket,
            };
            bucket.entry(method).or_default().push(plugin.clone());
        }
    }

    let mut table: DispatchTable = std::collections::HashMap::new();
    let methods: HashSet<&'static str> =
        high.keys().chain(regular.keys()).chain(async_bucket.keys()).copied().collect();
    for method in methods {
        let mut sync_list = high.remove(method).unwrap_or_default();
        sync_list.extend(regular.remove(method).unwrap_or_default());
        let async_list = async_bucket.remove(method).unwrap_or_default();
        table.insert(method, (sync_list, async_list));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::test_support::RecordingPlugin;
    use crate::plugin::PluginStartupInfo;
    use std::collections::HashMap;

    fn plugin(name: &str, priorities: &[(&'static str, Priority)]) -> PluginHandle {
        RecordingPlugin::new(PluginStartupInfo {
            name: name.to_string(),
            methods: priorities.iter().map(|(m, _)| *m).collect(),
            priorities: priorities.iter().copied().collect(),
            relevant_repos: None,
        })
    }

    #[test]
    fn validation_rejects_priority_with_no_handler() {
        let bad: PluginHandle = RecordingPlugin::new(PluginStartupInfo {
            name: "bad".to_string(),
            methods: vec![],
            priorities: HashMap::from([("textDocument/didOpen", Priority::High)]),
            relevant_repos: None,
        });
        assert!(validate_plugins(&[bad]).is_err());
    }

    #[test]
    fn validation_rejects_empty_name() {
        let bad: PluginHandle = RecordingPlugin::new(PluginStartupInfo {
            name: String::new(),
            methods: vec![],
            priorities: HashMap::new(),
            relevant_repos: None,
        });
        assert!(validate_plugins(&[bad]).is_err());
    }

    #[test]
    fn s6_dispatch_order_high_before_regular_async_separate() {
        let p1 = plugin("p1", &[("textDocument/didOpen", Priority::High)]);
        let p2 = plugin("p2", &[("textDocument/didOpen", Priority::Regular)]);
        let p3 = plugin("p3", &[("textDocument/didOpen", Priority::Async)]);

        let table = build_dispatch_table(&[p1, p2, p3], &HashMap::new(), "");
        let (sync, r#async) = table.get("textDocument/didOpen").unwrap();
        let sync_names: Vec<String> =
            sync.iter().map(|p| p.startup_info().name).collect();
        assert_eq!(sync_names, vec!["p1".to_string(), "p2".to_string()]);
        assert_eq!(r#async.len(), 1);
        assert_eq!(r#async[0].startup_info().name, "p3");
    }

    #[test]
    fn disabled_plugin_is_excluded() {
        let p1 = plugin("p1", &[("textDocument/didOpen", Priority::High)]);
        let enablement = HashMap::from([("p1".to_string(), false)]);
        let table = build_dispatch_table(&[p1], &enablement, "");
        assert!(table.get("textDocument/didOpen").is_none());
    }

    #[test]
    fn plugin_outside_relevant_repos_is_excluded() {
        let plugin: PluginHandle = RecordingPlugin::new(PluginStartupInfo {
            name: "repo-scoped".to_string(),
            methods: vec!["textDocument/didOpen"],
            priorities: HashMap::from([("textDocument/didOpen", Priority::High)]),
            relevant_repos: Some(vec!["monorepo-a".to_string()]),
        });
        let table = build_dispatch_table(&[plugin], &HashMap::new(), "monorepo-b");
        assert!(table.get("textDocument/didOpen").is_none());
    }
}
