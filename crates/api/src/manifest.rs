//! Loading resources from YAML manifests.

use std::path::Path;

use crate::error::{Error, Result};
use crate::object::DynamicObject;
use crate::registry::KindRegistry;
use crate::types::{ClusterSpec, ClusterStatus};

/// Parse and validate every resource in a YAML stream.
///
/// # Errors
///
/// Returns an error if a document does not parse, names an unregistered kind
/// or API version, or fails spec validation.
pub fn parse_manifests(
    source_name: &str,
    content: &str,
    registry: &KindRegistry,
) -> Result<Vec<DynamicObject>> {
    let objects: Vec<DynamicObject> = topology_core::parse_yaml_documents(source_name, content)?;
    objects
        .into_iter()
        .map(|object| validate(object, registry))
        .collect()
}

/// Load and validate every resource in the given manifest files, in order.
///
/// # Errors
///
/// Returns the first read, parse or validation error.
pub fn load_manifests<P: AsRef<Path>>(paths: &[P], registry: &KindRegistry) -> Result<Vec<DynamicObject>> {
    paths.iter().try_fold(Vec::new(), |mut acc, path| {
        let objects: Vec<DynamicObject> = topology_core::load_yaml_documents(path.as_ref())?;
        for object in objects {
            acc.push(validate(object, registry)?);
        }
        Ok(acc)
    })
}

fn validate(object: DynamicObject, registry: &KindRegistry) -> Result<DynamicObject> {
    let info = registry.resolve(&object.kind)?;
    let key = object.key();

    if object.metadata.name.is_empty() {
        return Err(Error::invalid_resource(key, "metadata.name is required"));
    }
    if object.api_version != info.api_version {
        return Err(Error::invalid_resource(
            key,
            format!(
                "apiVersion {} is not served for {}, expected {}",
                object.api_version, object.kind, info.api_version
            ),
        ));
    }

    let spec: ClusterSpec = if object.spec.is_null() {
        ClusterSpec::default()
    } else {
        serde_json::from_value(object.spec.clone())
            .map_err(|e| Error::invalid_resource(key.clone(), format!("spec: {e}")))?
    };
    spec.validate(&key)?;

    if !object.status.is_null() {
        serde_json::from_value::<ClusterStatus>(object.status.clone())
            .map_err(|e| Error::invalid_resource(key, format!("status: {e}")))?;
    }

    Ok(object)
}
