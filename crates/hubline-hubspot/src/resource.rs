//! Resource descriptors: which HubSpot collections to pull and where they land

/// A pullable HubSpot object collection.
///
/// Static for the lifetime of a run; the name doubles as the destination
/// table name and the watermark key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: String,
    /// Collection path, optionally with a query (`/crm/v3/objects/contacts?limit=100`)
    pub endpoint: String,
    /// Property catalogue used to request every property explicitly
    pub properties_endpoint: Option<String>,
}

impl Resource {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            properties_endpoint: None,
        }
    }

    pub fn with_properties_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.properties_endpoint = Some(endpoint.into());
        self
    }

    /// Built-in CRM contacts resource
    pub fn contacts() -> Self {
        Self::new("contacts", "/crm/v3/objects/contacts")
            .with_properties_endpoint("/properties/v1/contacts/properties")
    }

    /// Destination table name
    pub fn table(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Append `key=value` to an endpoint, choosing `?` or `&` as needed.
///
/// The value is appended verbatim: HubSpot cursors and timestamps must
/// reach the server byte-for-byte as they were received.
pub fn with_query(endpoint: &str, key: &str, value: &str) -> String {
    let sep = if endpoint.contains('?') { '&' } else { '?' };
    format!("{endpoint}{sep}{key}={value}")
}
