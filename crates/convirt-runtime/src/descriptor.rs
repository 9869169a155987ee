//! Domain descriptor parsing.
//!
//! Extracts from a libvirt domain XML the handful of fields convirt acts on:
//! the domain UUID, the container backend tag stored in the metadata
//! section, and the resources the backends translate into command-line
//! options.

use convirt_common::constants::{METADATA_CONTAINER_ELEMENT, METADATA_CONTAINERS_URI};
use convirt_common::error::{ConvirtError, Result};
use convirt_common::types::{BackendKind, VmId};
use roxmltree::{Document, Node};

/// Fields of a domain descriptor relevant to container backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSpec {
    /// Domain UUID.
    pub vm_id: VmId,
    /// Domain name, if present.
    pub name: Option<String>,
    /// Container backend named in the metadata.
    pub backend: BackendKind,
    /// Memory size in KiB.
    pub memory_kib: Option<u64>,
    /// Number of virtual CPUs, 1 when unspecified.
    pub vcpus: u32,
    /// Container image, taken from the first disk source.
    pub image: Option<String>,
    /// Bridge of the first bridged network interface.
    pub bridge: Option<String>,
}

impl DomainSpec {
    /// Parses a domain descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ConvirtError::Config`] if the document is not well-formed,
    /// is not a `<domain>`, lacks a valid `<uuid>`, or lacks the container
    /// metadata element.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)
            .map_err(|e| ConvirtError::config(format!("malformed domain XML: {e}")))?;
        let root = doc.root_element();
        if !root.has_tag_name("domain") {
            return Err(ConvirtError::config(format!(
                "expected <domain> root element, found <{}>",
                root.tag_name().name()
            )));
        }

        let vm_id: VmId = child_text(root, "uuid")
            .ok_or_else(|| ConvirtError::config("missing domain uuid"))?
            .parse()?;
        let backend = container_type(root)?;
        let memory_kib = root
            .children()
            .find(|n| n.has_tag_name("memory"))
            .map(parse_memory)
            .transpose()?;
        let vcpus = child_text(root, "vcpu")
            .map(|v| {
                v.parse()
                    .map_err(|e| ConvirtError::config(format!("invalid vcpu count {v:?}: {e}")))
            })
            .transpose()?
            .unwrap_or(1);

        let devices = root.children().find(|n| n.has_tag_name("devices"));
        let image = devices.and_then(disk_source);
        let bridge = devices.and_then(bridge_source);

        Ok(Self {
            vm_id,
            name: child_text(root, "name").map(str::to_string),
            backend,
            memory_kib,
            vcpus,
            image,
            bridge,
        })
    }
}

/// Reads the backend tag from `<metadata><container xmlns=…>`.
fn container_type(root: Node<'_, '_>) -> Result<BackendKind> {
    let tag = root
        .children()
        .find(|n| n.has_tag_name("metadata"))
        .and_then(|meta| {
            meta.children().find(|n| {
                n.has_tag_name((METADATA_CONTAINERS_URI, METADATA_CONTAINER_ELEMENT))
            })
        })
        .ok_or_else(|| ConvirtError::config("missing container type"))?;
    tag.text().unwrap_or_default().parse()
}

fn child_text<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn disk_source(devices: Node<'_, '_>) -> Option<String> {
    devices
        .children()
        .filter(|n| n.has_tag_name("disk"))
        .filter_map(|disk| disk.children().find(|n| n.has_tag_name("source")))
        .find_map(|source| source.attribute("file").or_else(|| source.attribute("dev")))
        .map(str::to_string)
}

fn bridge_source(devices: Node<'_, '_>) -> Option<String> {
    devices
        .children()
        .filter(|n| n.has_tag_name("interface") && n.attribute("type") == Some("bridge"))
        .filter_map(|iface| iface.children().find(|n| n.has_tag_name("source")))
        .find_map(|source| source.attribute("bridge"))
        .map(str::to_string)
}

/// Converts a `<memory unit="…">` element into KiB, libvirt's default unit.
fn parse_memory(node: Node<'_, '_>) -> Result<u64> {
    let text = node.text().unwrap_or_default().trim();
    let amount: u64 = text
        .parse()
        .map_err(|e| ConvirtError::config(format!("invalid memory size {text:?}: {e}")))?;
    let unit = node.attribute("unit").unwrap_or("KiB");
    let bytes_per_unit: u64 = match unit {
        "b" | "bytes" => 1,
        "KB" => 1000,
        "k" | "KiB" => 1024,
        "MB" => 1_000_000,
        "M" | "MiB" => 1024 * 1024,
        "GB" => 1_000_000_000,
        "G" | "GiB" => 1 << 30,
        "TB" => 1_000_000_000_000,
        "T" | "TiB" => 1 << 40,
        "PB" => 1_000_000_000_000_000,
        "P" | "PiB" => 1 << 50,
        "EB" => 1_000_000_000_000_000_000,
        "E" | "EiB" => 1 << 60,
        other => {
            return Err(ConvirtError::config(format!("unsupported memory unit {other:?}")));
        }
    };
    amount
        .checked_mul(bytes_per_unit)
        .map(|bytes| bytes / 1024)
        .ok_or_else(|| ConvirtError::config(format!("memory size overflows: {text}{unit}")))
}
