// SPDX-License-Identifier: MIT
// Copyright 2025. Triad National Security, LLC.

//! bootstrap.rs
//!
//! Rendering of the boot script that lets the nodes of a burst cluster join the overlay network of
//! the local cluster, and the host list that ties the burst nodes to broker ranks.

use std::{collections::BTreeMap, fmt, path::Path};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::{config::BurstParameters, BurstError};

/// Boot script template for nodes that join the local cluster.
pub const BURSTING_BOOT_SCRIPT: &str = include_str!("../templates/bursting_boot_script.sh");

/// The closed set of names that can be substituted into a boot script template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Placeholder {
    NodeList,
    CurveCert,
    MungeKey,
    LeadBrokerAddress,
    LeadBrokerPort,
}

impl Placeholder {
    pub const ALL: [Placeholder; 5] = [
        Placeholder::NodeList,
        Placeholder::CurveCert,
        Placeholder::MungeKey,
        Placeholder::LeadBrokerAddress,
        Placeholder::LeadBrokerPort,
    ];

    /// The literal text that marks this placeholder in a template.
    pub fn token(&self) -> &'static str {
        match self {
            Placeholder::NodeList => "NODELIST",
            Placeholder::CurveCert => "CURVECERT",
            Placeholder::MungeKey => "MUNGEKEY",
            Placeholder::LeadBrokerAddress => "LEAD_BROKER_ADDRESS",
            Placeholder::LeadBrokerPort => "LEAD_BROKER_PORT",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    /// A value was supplied for a placeholder that the template never uses.
    #[error("template has no {0} placeholder")]
    MissingPlaceholder(Placeholder),

    /// The template uses a placeholder that no value was supplied for.
    #[error("no value supplied for placeholder {0}")]
    MissingValue(Placeholder),
}

/// Values to substitute into a template, keyed by placeholder.
#[derive(Debug, Default, Clone)]
pub struct Substitutions {
    values: BTreeMap<Placeholder, String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.values.insert(placeholder, value.into());
        self
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values.get(&placeholder).map(|v| v.as_str())
    }

    pub fn placeholders(&self) -> impl Iterator<Item = Placeholder> + '_ {
        self.values.keys().copied()
    }
}

/// Find the earliest placeholder token in `text`.
fn next_placeholder(text: &str) -> Option<(usize, Placeholder)> {
    Placeholder::ALL
        .iter()
        .filter_map(|p| text.find(p.token()).map(|idx| (idx, *p)))
        .min_by_key(|(idx, _)| *idx)
}

/// Substitute `values` into `template`.
///
/// Every supplied placeholder must occur in the template, and every placeholder occurring in the
/// template must have a value. The template is scanned once, left to right, so text coming from a
/// substituted value is never itself treated as a placeholder.
pub fn render(template: &str, values: &Substitutions) -> Result<String, RenderError> {
    if let Some(unused) = values
        .placeholders()
        .find(|p| !template.contains(p.token()))
    {
        return Err(RenderError::MissingPlaceholder(unused));
    }

    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some((idx, placeholder)) = next_placeholder(rest) {
        let value = values
            .get(placeholder)
            .ok_or(RenderError::MissingValue(placeholder))?;
        rendered.push_str(&rest[..idx]);
        rendered.push_str(value);
        rest = &rest[idx + placeholder.token().len()..];
    }
    rendered.push_str(rest);

    Ok(rendered)
}

/// Format `count` hosts named `<prefix>-NNN`, numbered from 001, as a compact host list.
fn host_range(prefix: &str, count: u32) -> Option<String> {
    match count {
        0 => None,
        1 => Some(format!("{prefix}-001")),
        n => Some(format!("{prefix}-[001-{n:03}]")),
    }
}

/// The host names of the burst cluster, in the order they will be given broker ranks after the
/// lead host: login hosts first, then compute hosts.
///
/// Uses `lead_hostnames` verbatim when set; otherwise the names are derived from `lead_size` and
/// the login and compute name prefixes.
pub fn burst_hostnames(params: &BurstParameters) -> Option<String> {
    if let Some(hostnames) = &params.lead_hostnames {
        return Some(hostnames.clone());
    }
    let size = params.lead_size?;
    let login = params.login_count.min(size);
    let names: Vec<String> = [
        host_range(&params.login_name_prefix, login),
        host_range(&params.compute_name_prefix, size - login),
    ]
    .into_iter()
    .flatten()
    .collect();

    Some(names.join(","))
}

/// The host list shared by the broker bootstrap config and the resource description.
///
/// The lead host is always first (rank 0), followed by the burst host names. The two must agree
/// index for index or the resources flux schedules onto will not match the overlay network.
pub fn resource_hostlist(params: &BurstParameters) -> Option<String> {
    let lead = params.lead_host.as_ref()?;
    match burst_hostnames(params) {
        Some(hosts) if !hosts.is_empty() => Some(format!("{lead},{hosts}")),
        _ => Some(lead.clone()),
    }
}

pub fn read_curve_cert(path: &Path) -> crate::Result<String> {
    std::fs::read_to_string(path).map_err(|source| BurstError::Read {
        what: "curve certificate",
        path: path.to_path_buf(),
        source,
    })
}

/// Read the munge key and encode it as base64 so it can travel inside text.
pub fn read_munge_key(path: &Path) -> crate::Result<String> {
    let key = std::fs::read(path).map_err(|source| BurstError::Read {
        what: "munge key",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(STANDARD.encode(key))
}

/// Render the boot script for the nodes of a joined burst.
///
/// Requires the lead host and port, the curve certificate and the munge key; validation has
/// already checked they are present, so a missing one is reported as invalid parameters.
pub fn render_boot_script(params: &BurstParameters) -> crate::Result<String> {
    let (Some(hosts), Some(port), Some(cert), Some(key)) = (
        resource_hostlist(params),
        params.lead_port,
        params.curve_cert.as_deref(),
        params.munge_key.as_deref(),
    ) else {
        return Err(BurstError::InvalidParameters);
    };
    let Some(lead) = params.lead_host.as_deref() else {
        return Err(BurstError::InvalidParameters);
    };

    let values = Substitutions::new()
        .with(Placeholder::NodeList, hosts)
        .with(Placeholder::CurveCert, read_curve_cert(cert)?)
        .with(Placeholder::MungeKey, read_munge_key(key)?)
        .with(Placeholder::LeadBrokerAddress, lead)
        .with(Placeholder::LeadBrokerPort, port.to_string());

    Ok(render(BURSTING_BOOT_SCRIPT, &values)?)
}
