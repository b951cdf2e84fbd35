//! Document sections.
//!
//! The walk tracks which part of a Swagger/OpenAPI document it is in, derived
//! purely from mapping keys. The section decides how a reference found there
//! is substituted: path items merge with their siblings, schema references
//! into other documents are imported as models, and literal data is left
//! alone.

/// Where a node sits in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Document,
    Components,
    Paths,
    PathItem,
    Operation,
    Callbacks,
    Callback,
    Parameters,
    Parameter,
    Responses,
    Response,
    /// A mapping of name → schema (`definitions`, `properties`, ...).
    Schemas,
    Schema,
    /// Example values, defaults, enums, extensions: never walked.
    Literal,
    Other,
}

const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

impl Section {
    /// Section of the value stored under `key` in a mapping of this section.
    pub fn child(self, key: &str) -> Section {
        // Keys of name → thing mappings are names, so `example` is a valid
        // property name there. Only extensions stay literal.
        if self.is_name_map() {
            if key.starts_with("x-") {
                return Section::Literal;
            }
        } else if is_literal_key(key) {
            return Section::Literal;
        }

        match self {
            Section::Document => match key {
                "paths" | "webhooks" => Section::Paths,
                "definitions" => Section::Schemas,
                "parameters" => Section::Parameters,
                "responses" => Section::Responses,
                "components" => Section::Components,
                _ => Section::Other,
            },
            Section::Components => match key {
                "schemas" => Section::Schemas,
                "parameters" => Section::Parameters,
                "responses" => Section::Responses,
                "callbacks" => Section::Callbacks,
                "pathItems" => Section::Paths,
                _ => Section::Other,
            },
            Section::Paths => Section::PathItem,
            Section::PathItem => match key {
                "parameters" => Section::Parameters,
                method if HTTP_METHODS.contains(&method) => Section::Operation,
                _ => Section::Other,
            },
            Section::Operation => match key {
                "parameters" => Section::Parameters,
                "responses" => Section::Responses,
                "callbacks" => Section::Callbacks,
                _ => Section::Other,
            },
            Section::Callbacks => Section::Callback,
            Section::Callback => Section::PathItem,
            Section::Parameters => Section::Parameter,
            Section::Responses => Section::Response,
            Section::Parameter => match key {
                "schema" | "items" => Section::Schema,
                _ => Section::Other,
            },
            Section::Response => match key {
                "schema" => Section::Schema,
                _ => Section::Other,
            },
            Section::Schemas => Section::Schema,
            Section::Schema => match key {
                "properties" | "patternProperties" | "definitions" | "$defs" => Section::Schemas,
                "items" | "additionalProperties" | "not" | "additionalItems" | "allOf"
                | "anyOf" | "oneOf" => Section::Schema,
                _ => Section::Other,
            },
            Section::Literal => Section::Literal,
            Section::Other => match key {
                "schema" => Section::Schema,
                _ => Section::Other,
            },
        }
    }

    /// Section of an element of a sequence in this section.
    pub fn element(self) -> Section {
        match self {
            Section::Parameters => Section::Parameter,
            Section::Responses => Section::Response,
            other => other,
        }
    }

    fn is_name_map(self) -> bool {
        matches!(
            self,
            Section::Paths | Section::Callbacks | Section::Parameters | Section::Responses | Section::Schemas
        )
    }

    /// True when references found here are models eligible for import.
    pub fn is_model(self) -> bool {
        self == Section::Schema
    }
}

/// Keys whose values are data, not structure.
fn is_literal_key(key: &str) -> bool {
    matches!(key, "example" | "default" | "enum" | "const") || key.starts_with("x-")
}
