// Component and index templates backing the Scout events data stream

use serde_json::{Value, json};

/// A named template definition, sent as-is to the store
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: &'static str,
    pub body: Value,
}

pub const ENVIRONMENT_MAPPINGS: &str = "scout-test-event.mappings.environment";
pub const TEST_RUN_MAPPINGS: &str = "scout-test-event.mappings.test-run";
pub const SUITE_MAPPINGS: &str = "scout-test-event.mappings.suite";
pub const TEST_MAPPINGS: &str = "scout-test-event.mappings.test";

pub const TEST_EVENTS_INDEX_TEMPLATE: &str = "scout-test-events";
pub const TEST_EVENTS_INDEX_PATTERN: &str = "scout-test-events-*";

fn keyword() -> Value {
    json!({ "type": "keyword" })
}

fn text_with_keyword() -> Value {
    json!({
        "type": "text",
        "fields": { "keyword": { "type": "keyword", "ignore_above": 1024 } }
    })
}

fn object_mapping(field: &str, properties: Value) -> Value {
    json!({
        "template": {
            "mappings": {
                "properties": {
                    field: { "type": "object", "properties": properties }
                }
            }
        }
    })
}

pub fn environment_mappings() -> Template {
    let properties = json!({
        "host": {
            "properties": {
                "name": keyword(),
                "os": keyword(),
                "family": keyword(),
                "architecture": keyword(),
                "pid": { "type": "long" }
            }
        },
        "ci": {
            "properties": {
                "build_id": keyword(),
                "build_number": keyword(),
                "build_url": keyword(),
                "branch": keyword(),
                "commit": keyword(),
                "job_id": keyword(),
                "pipeline_slug": keyword(),
                "agent_name": keyword(),
                "retry_count": { "type": "integer" },
                "pull_request": keyword()
            }
        }
    });
    Template {
        name: ENVIRONMENT_MAPPINGS,
        body: object_mapping("environment", properties),
    }
}

pub fn test_run_mappings() -> Template {
    let properties = json!({
        "id": keyword(),
        "status": keyword(),
        "duration": { "type": "long" }
    });
    Template {
        name: TEST_RUN_MAPPINGS,
        body: object_mapping("test_run", properties),
    }
}

pub fn suite_mappings() -> Template {
    let properties = json!({
        "title": text_with_keyword(),
        "type": keyword(),
        "hook": {
            "properties": {
                "title": text_with_keyword(),
                "duration": { "type": "long" }
            }
        }
    });
    Template {
        name: SUITE_MAPPINGS,
        body: object_mapping("suite", properties),
    }
}

pub fn test_mappings() -> Template {
    let properties = json!({
        "id": keyword(),
        "title": text_with_keyword(),
        "tags": keyword(),
        "annotations": {
            "properties": {
                "type": keyword(),
                "description": { "type": "text" }
            }
        },
        "expected_status": keyword(),
        "status": keyword(),
        "duration": { "type": "long" },
        "step": {
            "properties": {
                "title": text_with_keyword(),
                "category": keyword(),
                "duration": { "type": "long" }
            }
        }
    });
    Template {
        name: TEST_MAPPINGS,
        body: object_mapping("test", properties),
    }
}

/// Component templates in the order they are bootstrapped
pub fn component_templates() -> [Template; 4] {
    [
        environment_mappings(),
        test_run_mappings(),
        suite_mappings(),
        test_mappings(),
    ]
}

/// Index template binding the component templates to the data stream pattern
pub fn test_events_index_template() -> Template {
    let composed_of: Vec<&str> = component_templates().iter().map(|t| t.name).collect();
    Template {
        name: TEST_EVENTS_INDEX_TEMPLATE,
        body: json!({
            "index_patterns": [TEST_EVENTS_INDEX_PATTERN],
            "data_stream": {},
            "priority": 200,
            "composed_of": composed_of,
            "template": {
                "mappings": {
                    "properties": {
                        "@timestamp": { "type": "date" },
                        "event": {
                            "properties": {
                                "action": keyword(),
                                "error": {
                                    "properties": {
                                        "message": { "type": "text" },
                                        "stack_trace": { "type": "text", "index": false }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "_meta": { "description": "Scout test run events" }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_templates_cover_event_fields() {
        let fields: Vec<String> = component_templates()
            .iter()
            .map(|t| {
                let props = t.body["template"]["mappings"]["properties"]
                    .as_object()
                    .unwrap();
                props.keys().next().unwrap().clone()
            })
            .collect();
        assert_eq!(fields, vec!["environment", "test_run", "suite", "test"]);
    }

    #[test]
    fn test_index_template_composes_all_components() {
        let template = test_events_index_template();
        let composed = template.body["composed_of"].as_array().unwrap();
        assert_eq!(composed.len(), 4);
        assert_eq!(composed[0], ENVIRONMENT_MAPPINGS);
        assert_eq!(template.body["index_patterns"][0], TEST_EVENTS_INDEX_PATTERN);
        assert!(template.body["data_stream"].is_object());
    }
}
