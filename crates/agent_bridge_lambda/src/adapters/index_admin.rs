use serde_json::Value;

pub trait IndexAdmin {
    /// Creates `index_name` on `host` and returns the service's response body.
    fn create_index(&self, host: &str, index_name: &str, body: &Value) -> Result<Value, String>;
}
