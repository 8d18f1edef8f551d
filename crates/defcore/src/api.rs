use serde::{Deserialize, Serialize};

/// Shape of an API definition file (`apis/**/*.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiDefinition {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub guard: Option<String>,
    pub paths: Vec<ApiPath>,
}

/// One route of an API definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiPath {
    pub path: String,
    pub method: String,
    pub process: String,
    #[serde(default)]
    pub guard: Option<String>,
}

impl ApiDefinition {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }
}

impl ApiPath {
    /// Mount point of this path under `/api/<group>`, with `:param`
    /// segments rewritten to `{param}`
    pub fn route(&self, group: &str) -> String {
        let mut route = String::from("/api");
        let group = group.trim_matches('/');
        if !group.is_empty() {
            route.push('/');
            route.push_str(group);
        }

        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            route.push('/');
            match segment.strip_prefix(':') {
                Some(param) => {
                    route.push('{');
                    route.push_str(param);
                    route.push('}');
                }
                None => route.push_str(segment),
            }
        }

        route
    }

    pub fn method(&self) -> String {
        self.method.to_ascii_uppercase()
    }
}
