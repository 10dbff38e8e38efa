//! Starter artifacts printed by `generate`.

const CONFIG_TEMPLATE: &str = include_str!("../assets/config.yml");
const LAMBDA_HANDLER: &str = include_str!("../assets/handler.js");

/// A complete configuration document to start from.
pub fn config_template() -> &'static str {
    CONFIG_TEMPLATE
}

/// Handler skeleton matching the request template the Lambda shorthand uses.
pub fn lambda_handler() -> &'static str {
    LAMBDA_HANDLER
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Document;
    use crate::normalize;

    #[test]
    fn config_template_parses_and_normalizes() {
        let document = Document::from_yaml(config_template(), Default::default()).unwrap();
        let lambda = document.lambda.unwrap();
        assert_eq!(lambda.function_name, "my-function");
        let api = document.api_gateway.unwrap();
        let tree = normalize::desired_tree(&api).unwrap();
        assert!(tree.contains_key("/"));
        assert!(tree["/users/{id}"].contains_key("DELETE"));
        assert!(normalize::uses_lambda(&tree));
    }

    #[test]
    fn handler_exports_entry_point() {
        assert!(lambda_handler().contains("exports.handler"));
    }
}
