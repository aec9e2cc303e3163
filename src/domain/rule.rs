use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;

/// The naming families a branch can belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchFamily {
    /// `nb5.0`: the release value is part of the name
    ReleaseLine,
    /// `nbplayground`: the release value is the next unallocated release line
    Rolling,
    /// `nb-rhel6`, `nb-epel6`: downstream distribution branches
    Downstream,
    /// Recognised, but deliberately not handled yet
    Unsupported,
}

impl BranchFamily {
    pub fn name(&self) -> &'static str {
        match self {
            BranchFamily::ReleaseLine => "release-line",
            BranchFamily::Rolling => "rolling",
            BranchFamily::Downstream => "downstream",
            BranchFamily::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for BranchFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the branch rule table, as written in the configuration.
///
/// Templates may reference `{dist_val}` and `{arch}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRule {
    pub family: BranchFamily,

    /// Regular expression matched against the whole branch name. Capture
    /// group 1, when present, is the release value.
    pub pattern: String,

    pub dist_var: String,

    pub dist_tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_root: Option<String>,

    /// Replaces the branch name when composing the build target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
}

impl BranchRule {
    pub fn new(
        family: BranchFamily,
        pattern: &str,
        dist_var: &str,
        dist_tag: &str,
        build_root: Option<&str>,
    ) -> Self {
        BranchRule {
            family,
            pattern: pattern.to_string(),
            dist_var: dist_var.to_string(),
            dist_tag: dist_tag.to_string(),
            build_root: build_root.map(str::to_string),
            target_branch: None,
        }
    }

    pub fn with_target_branch(mut self, template: &str) -> Self {
        self.target_branch = Some(template.to_string());
        self
    }

    /// The Network Box rule table, in evaluation order.
    pub fn defaults() -> Vec<BranchRule> {
        vec![
            BranchRule::new(
                BranchFamily::ReleaseLine,
                r"nb(\d+\.\d+)",
                "nbrs",
                "nb{dist_val}",
                Some("nb{dist_val}-{arch}"),
            ),
            BranchRule::new(
                BranchFamily::Rolling,
                "nbplayground",
                "nbrs",
                "nb{dist_val}",
                Some("nbplayground-{arch}"),
            ),
            BranchRule::new(
                BranchFamily::Rolling,
                "nbnext",
                "nbrs",
                "nb{dist_val}",
                Some("nbplayground-{arch}"),
            )
            .with_target_branch("nb{dist_val}"),
            BranchRule::new(
                BranchFamily::Unsupported,
                r"nb-fedora(\d\d)",
                "fedora",
                "fc{dist_val}",
                Some("fedora-{dist_val}-{arch}"),
            ),
            BranchRule::new(BranchFamily::Unsupported, "nb-master", "fedora", "fc{dist_val}", None),
            BranchRule::new(
                BranchFamily::Downstream,
                r"nb-rhel(\d)",
                "rhel",
                "el{dist_val}",
                Some("epel-{dist_val}-{arch}"),
            ),
            BranchRule::new(
                BranchFamily::Downstream,
                r"nb-epel(\d)",
                "rhel",
                "el{dist_val}",
                Some("epel-{dist_val}-{arch}"),
            ),
        ]
    }
}

/// A [`BranchRule`] with its pattern compiled and anchored.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: BranchRule,
    regex: Regex,
}

impl CompiledRule {
    pub fn compile(rule: BranchRule) -> Result<Self, ResolutionError> {
        // Only whole names count: nb5.0-foobar must not pass for nb5.0
        let anchored = format!("^(?:{})$", rule.pattern);
        let regex = Regex::new(&anchored).map_err(|e| ResolutionError::InvalidRule {
            pattern: rule.pattern.clone(),
            reason: e.to_string(),
        })?;

        Ok(CompiledRule { rule, regex })
    }

    pub fn family(&self) -> BranchFamily {
        self.rule.family
    }

    pub fn is_match(&self, branch: &str) -> bool {
        self.regex.is_match(branch)
    }

    /// The release value embedded in `branch`, if the rule captures one
    pub fn captured_value(&self, branch: &str) -> Option<String> {
        self.regex
            .captures(branch)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Strip the literal text before the capture group from a dist tag.
    ///
    /// For `nb(\d+\.\d+)` this turns `nb5.1` into `5.1`.
    pub fn strip_prefix<'a>(&self, value: &'a str) -> &'a str {
        let prefix = self.literal_prefix();
        value.strip_prefix(prefix.as_str()).unwrap_or(value)
    }

    fn literal_prefix(&self) -> String {
        let pattern = self.rule.pattern.as_str();
        let end = pattern.find('(').unwrap_or(pattern.len());
        pattern[..end].replace('\\', "")
    }
}

/// Substitute `{dist_val}` and `{arch}` in a rule template
pub fn render_template(template: &str, dist_val: &str, arch: &str) -> String {
    template
        .replace("{dist_val}", dist_val)
        .replace("{arch}", arch)
}
