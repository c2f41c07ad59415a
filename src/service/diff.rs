use super::ApiService;
use crate::envelope::{ApiError, ApiResponse};
use crate::request::{Endpoint, RequestOptions};
use reqwest::Method;
use serde::Serialize;
use serde_json::{Map, Value};

/// Result of [`ApiService::patch_difference`].
#[derive(Debug, Clone)]
pub struct PatchDifference {
    /// Top-level keys of the new values that differ from the old ones.
    pub diff: Map<String, Value>,
    pub has_changes: bool,
    /// `None` when nothing changed and no request was made.
    pub response: Option<ApiResponse>,
}

/// Keys of `new` whose value is absent from or different in `old`.
pub(crate) fn shallow_diff(old: &Value, new: &Value) -> Map<String, Value> {
    let Some(new) = new.as_object() else {
        return Map::new();
    };
    new.iter()
        .filter(|(key, value)| old.get(key.as_str()) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

impl ApiService {
    /// PATCH only the top-level fields that changed between `old` and `new`.
    ///
    /// Nothing is sent when there are no changes.
    pub async fn patch_difference(
        &self,
        endpoint: impl Into<Endpoint>,
        old: &impl Serialize,
        new: &impl Serialize,
        options: RequestOptions,
    ) -> Result<PatchDifference, ApiError> {
        let endpoint = endpoint.into();
        let values = serde_json::to_value(old).and_then(|old| Ok((old, serde_json::to_value(new)?)));
        let (old, new) = match values {
            Ok(values) => values,
            Err(e) => {
                let options = self.default_options().merge(&options);
                return Err(Self::invalid_request(Method::PATCH, endpoint, options, e.to_string()));
            }
        };

        let diff = shallow_diff(&old, &new);
        if diff.is_empty() {
            return Ok(PatchDifference {
                diff,
                has_changes: false,
                response: None,
            });
        }

        let response = self
            .patch(endpoint, &Value::Object(diff.clone()), options)
            .await?;
        Ok(PatchDifference {
            diff,
            has_changes: true,
            response: Some(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_changed_and_new_keys() {
        let diff = shallow_diff(
            &json!({"dept": 42, "name": "Jon", "tags": ["a"]}),
            &json!({"dept": 42, "name": "Jonathan", "tags": ["a"], "email": null}),
        );
        assert_eq!(Value::Object(diff), json!({"name": "Jonathan", "email": null}));
    }

    #[test]
    fn ignores_removed_keys() {
        assert!(shallow_diff(&json!({"a": 1, "b": 2}), &json!({"a": 1})).is_empty());
    }

    #[test]
    fn non_objects_have_no_diff() {
        assert!(shallow_diff(&json!({"a": 1}), &json!([1, 2])).is_empty());
    }

    #[tokio::test]
    async fn unchanged_values_send_nothing() {
        let service = ApiService::offline();
        let result = service
            .patch_difference("/users/1", &json!({"a": 1}), &json!({"a": 1}), RequestOptions::new())
            .await
            .unwrap();
        assert!(!result.has_changes);
        assert!(result.response.is_none());
        assert_eq!(service.pending_count(), 0);
    }
}
