//! Tool profiles and their lookup.

use std::path::Path;

use serde::Deserialize;

use crate::{
    config::load_yaml,
    errors::{RegressError, Result, ToolKind},
};

/// Commands for an RTL simulator that builds and runs the instruction
/// generator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ToolProfile {
    #[serde(rename = "tool")]
    pub tool_name: String,
    /// Build steps, executed in order.
    #[serde(rename = "compile_cmd", default)]
    pub compile_commands: Vec<String>,
    #[serde(rename = "sim_cmd")]
    pub run_command: String,
}

/// Command for an instruction-set simulator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IssProfile {
    #[serde(rename = "iss")]
    pub tool_name: String,
    /// Environment variable substituted for `<path_var>`.
    pub path_var: String,
    #[serde(rename = "cmd")]
    pub run_command: String,
}

/// Anything that can be looked up by tool name.
pub trait Profile {
    const KIND: ToolKind;

    fn tool_name(&self) -> &str;
}

impl Profile for ToolProfile {
    const KIND: ToolKind = ToolKind::Simulator;

    fn tool_name(&self) -> &str {
        &self.tool_name
    }
}

impl Profile for IssProfile {
    const KIND: ToolKind = ToolKind::Iss;

    fn tool_name(&self) -> &str {
        &self.tool_name
    }
}

/// Returns the first profile named exactly `name`.
pub fn lookup<'a, P: Profile>(profiles: &'a [P], name: &str) -> Result<&'a P> {
    profiles
        .iter()
        .find(|profile| profile.tool_name() == name)
        .ok_or_else(|| {
            let available: Vec<&str> = profiles.iter().map(P::tool_name).collect();
            RegressError::unknown_tool(P::KIND, name, &available)
        })
}

pub fn load_tool_profiles(path: &Path) -> Result<Vec<ToolProfile>> {
    tracing::info!(file = %path.display(), "processing simulator setup file");
    load_yaml(path)
}

pub fn load_iss_profiles(path: &Path) -> Result<Vec<IssProfile>> {
    tracing::info!(file = %path.display(), "processing ISS setup file");
    load_yaml(path)
}
