//! Thread-safe tool registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};

use crate::definition::{validate_input_schema, validate_tool_name, ToolDefinition, ToolInfo};

/// Registry of agent-visible tools, shared across the MCP server tasks.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn ToolDefinition>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Rejects duplicate names, invalid names, and
    /// untyped schemas.
    pub fn register(&self, tool: Box<dyn ToolDefinition>) -> Result<()> {
        let name = tool.name().to_string();
        validate_tool_name(&name)?;
        validate_input_schema(&tool.input_schema())?;

        let mut map = self
            .tools
            .write()
            .map_err(|e| anyhow::anyhow!("registry lock poisoned: {e}"))?;
        if map.contains_key(&name) {
            bail!("tool already registered: {name}");
        }
        map.insert(name, Arc::from(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolDefinition>> {
        self.tools.read().ok()?.get(name).cloned()
    }

    /// All registered tools, sorted by name for deterministic listings.
    pub fn list(&self) -> Vec<ToolInfo> {
        let map = self.tools.read().expect("registry lock poisoned");
        let mut infos: Vec<ToolInfo> = map
            .values()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.tools.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    struct StubTool {
        name: String,
    }

    #[async_trait::async_trait]
    impl ToolDefinition for StubTool {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
            Ok(json!({"tool": self.name}))
        }
    }

    fn stub(name: &str) -> Box<StubTool> {
        Box::new(StubTool { name: name.into() })
    }

    #[test]
    fn registers_and_lists_sorted() {
        let registry = ToolRegistry::new();
        registry.register(stub("zeta")).unwrap();
        registry.register(stub("alpha")).unwrap();

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "alpha");
        assert_eq!(listed[1].name, "zeta");
    }

    #[test]
    fn rejects_duplicates() {
        let registry = ToolRegistry::new();
        registry.register(stub("dup")).unwrap();
        let err = registry.register(stub("dup")).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn rejects_invalid_names() {
        let registry = ToolRegistry::new();
        assert!(registry.register(stub("bad-name")).is_err());
        assert!(registry.register(stub("")).is_err());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn lookup_by_name() {
        let registry = ToolRegistry::new();
        registry.register(stub("present")).unwrap();
        assert!(registry.get("present").is_some());
        assert!(registry.get("absent").is_none());
    }
}
