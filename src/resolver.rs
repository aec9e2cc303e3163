//! Branch to build-target resolution.
//!
//! [`Resolver::resolve`] maps the active branch name to a [`ResolvedTarget`]
//! using a rule table. It performs no I/O of its own: remote branches, the push
//! remote and the machine architecture arrive as a [`RepoContext`], and the Koji
//! lookup used as a last resort is an injected [`BuildTargetService`].

use serde::{Deserialize, Serialize};

use crate::domain::branch::simple_name;
use crate::domain::rule::render_template;
use crate::domain::{
    compose_build_target, BranchFamily, BranchRule, CompiledRule, Freedom, ReleaseLine,
    RemoteInfo, ResolvedTarget,
};
use crate::error::ResolutionError;
use crate::koji::BuildTargetService;

/// How release-line branches are ordered when looking for the latest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseLineOrder {
    /// Plain string order on the branch name: `nb5.10` sorts before `nb5.9`.
    #[default]
    Lexicographic,
    /// Order by the parsed release value.
    Numeric,
}

/// Repository facts the resolver needs, gathered once by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoContext {
    /// Remote-tracking branches as `remote/name`
    pub remote_branches: Vec<String>,
    pub push_remote: RemoteInfo,
    /// RPM architecture of this machine
    pub arch: String,
}

impl RepoContext {
    pub fn new(remote_branches: Vec<String>, push_remote: RemoteInfo, arch: impl Into<String>) -> Self {
        RepoContext {
            remote_branches,
            push_remote,
            arch: arch.into(),
        }
    }

    pub fn freedom(&self) -> Freedom {
        Freedom::from_remote(&self.push_remote.name, &self.push_remote.url)
    }
}

/// The architecture name rpm uses for this machine
pub fn local_arch() -> String {
    match std::env::consts::ARCH {
        "x86" => "i386",
        "powerpc64" => "ppc64",
        "powerpc" => "ppc",
        other => other,
    }
    .to_string()
}

/// Resolves branch names against a compiled rule table
#[derive(Debug, Clone)]
pub struct Resolver {
    rules: Vec<CompiledRule>,
    order: ReleaseLineOrder,
    experimental_branch: String,
}

impl Resolver {
    /// Compile `rules` (evaluated in the given order).
    ///
    /// `experimental_branch` names the branch whose Koji target is queried
    /// when no release-line branch exists yet.
    pub fn new(
        rules: Vec<BranchRule>,
        order: ReleaseLineOrder,
        experimental_branch: impl Into<String>,
    ) -> Result<Self, ResolutionError> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Resolver {
            rules,
            order,
            experimental_branch: experimental_branch.into(),
        })
    }

    /// Resolver with the built-in Network Box rules
    pub fn with_defaults() -> Result<Self, ResolutionError> {
        Self::new(BranchRule::defaults(), ReleaseLineOrder::default(), "nbplayground")
    }

    /// Resolve `branch_merge` into a complete target, or fail without any
    /// partial result.
    pub fn resolve(
        &self,
        branch_merge: &str,
        ctx: &RepoContext,
        targets: Option<&dyn BuildTargetService>,
    ) -> Result<ResolvedTarget, ResolutionError> {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.is_match(branch_merge))
            .ok_or_else(|| ResolutionError::UnrecognizedBranch {
                branch: branch_merge.to_string(),
            })?;

        tracing::debug!(
            branch = branch_merge,
            family = %rule.family(),
            pattern = %rule.rule.pattern,
            "matched branch rule"
        );

        let dist_val = match rule.family() {
            BranchFamily::Unsupported => {
                return Err(ResolutionError::UnsupportedBranchFamily {
                    branch: branch_merge.to_string(),
                    distribution: rule.rule.dist_var.clone(),
                })
            }
            BranchFamily::Rolling => self.infer_next_release_line(branch_merge, ctx, targets)?,
            BranchFamily::ReleaseLine | BranchFamily::Downstream => {
                rule.captured_value(branch_merge)
                    .ok_or_else(|| ResolutionError::InvalidRule {
                        pattern: rule.rule.pattern.clone(),
                        reason: "the pattern needs a capture group for the release value"
                            .to_string(),
                    })?
            }
        };

        let freedom = ctx.freedom();
        let render = |template: &str| render_template(template, &dist_val, &ctx.arch);

        let target_branch = rule
            .rule
            .target_branch
            .as_deref()
            .map(render)
            .unwrap_or_else(|| branch_merge.to_string());

        Ok(ResolvedTarget {
            branch: branch_merge.to_string(),
            family: rule.family(),
            dist_var: rule.rule.dist_var.clone(),
            dist_tag: render(&rule.rule.dist_tag),
            build_root: rule.rule.build_root.as_deref().map(render),
            build_target: compose_build_target(&target_branch, freedom),
            is_free: freedom.is_free(),
            dist_val,
        })
    }

    /// Work out the next release line that has no branch yet.
    ///
    /// The latest release-line branch among the remote-tracking branches is
    /// bumped by one. Without any, the destination tag of the experimental
    /// Koji target is used as is.
    pub fn infer_next_release_line(
        &self,
        branch: &str,
        ctx: &RepoContext,
        targets: Option<&dyn BuildTargetService>,
    ) -> Result<String, ResolutionError> {
        let undeterminable = |reason: String| ResolutionError::ReleaseLineUndeterminable {
            branch: branch.to_string(),
            reason,
        };

        let release = self
            .rules
            .iter()
            .find(|rule| rule.family() == BranchFamily::ReleaseLine)
            .ok_or_else(|| undeterminable("no release-line rule is configured".to_string()))?;

        let mut candidates: Vec<&str> = ctx
            .remote_branches
            .iter()
            .map(|name| simple_name(name))
            .filter(|name| release.is_match(name))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        let release_value = |name: &str| {
            release
                .captured_value(name)
                .unwrap_or_else(|| release.strip_prefix(name).to_string())
        };

        let numeric_latest = candidates
            .iter()
            .filter_map(|&name| ReleaseLine::parse(&release_value(name)).map(|line| (line, name)))
            .max()
            .map(|(_, name)| name);

        let latest = match self.order {
            ReleaseLineOrder::Lexicographic => candidates.last().copied(),
            ReleaseLineOrder::Numeric => numeric_latest,
        };

        if let Some(latest) = latest {
            if let Some(numeric) = numeric_latest.filter(|numeric| *numeric != latest) {
                tracing::warn!(
                    "release lines are ordered as strings: picked {} although {} is numerically newer",
                    latest,
                    numeric
                );
            }

            let value = release_value(latest);
            let line = ReleaseLine::parse(&value)
                .ok_or_else(|| undeterminable(format!("cannot parse release line of {}", latest)))?;

            let next = line
                .next()
                .ok_or_else(|| undeterminable(format!("release line {} has no successor", latest)))?;

            tracing::debug!(latest, next = %next, "inferred release line from branches");
            return Ok(next.to_string());
        }

        let service = targets
            .ok_or_else(|| undeterminable("no release-line branch and no build target service".to_string()))?;

        let experimental = compose_build_target(&self.experimental_branch, ctx.freedom());
        let dest_tag = service.dest_tag(&experimental).map_err(|e| {
            undeterminable(format!(
                "unable to query koji to find experimental target {}: {}",
                experimental, e
            ))
        })?;

        // Drop the trailing -free or -nonfree
        let head = dest_tag.split('-').next().unwrap_or(&dest_tag);
        let value = release.strip_prefix(head);

        if ReleaseLine::parse(value).is_none() {
            return Err(undeterminable(format!(
                "destination tag {} of {} is not a release line",
                dest_tag, experimental
            )));
        }

        tracing::debug!(dest_tag = %dest_tag, value, "inferred release line from koji");
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NbpkgError, Result};
    use crate::koji::StaticTargets;

    struct Unreachable;

    impl BuildTargetService for Unreachable {
        fn dest_tag(&self, _target: &str) -> Result<String> {
            Err(NbpkgError::koji("connection refused"))
        }
    }

    fn ctx(branches: &[&str], remote: &str) -> RepoContext {
        RepoContext::new(
            branches.iter().map(|b| b.to_string()).collect(),
            RemoteInfo::new(remote, format!("ssh://git.example.com/{}/foo", remote)),
            "x86_64",
        )
    }

    fn resolver() -> Resolver {
        Resolver::with_defaults().unwrap()
    }

    #[test]
    fn test_release_line_branch() {
        let target = resolver()
            .resolve("nb5.0", &ctx(&[], "networkbox"), None)
            .unwrap();
        assert_eq!(target.family, BranchFamily::ReleaseLine);
        assert_eq!(target.dist_val, "5.0");
        assert_eq!(target.dist_var, "nbrs");
        assert_eq!(target.dist_tag, "nb5.0");
        assert_eq!(target.build_root.as_deref(), Some("nb5.0-x86_64"));
        assert_eq!(target.build_target, "nb5.0-free-candidate");
        assert!(target.is_free);
    }

    #[test]
    fn test_release_line_values_round_trip_for_many_names() {
        let resolver = resolver();
        for major in 0..12 {
            for minor in 0..12 {
                let branch = format!("nb{}.{}", major, minor);
                let target = resolver.resolve(&branch, &ctx(&[], "networkbox"), None).unwrap();
                assert_eq!(target.dist_val, format!("{}.{}", major, minor));
                assert_eq!(target.dist_tag, branch);
            }
        }
    }

    #[test]
    fn test_nonfree_remote() {
        let target = resolver()
            .resolve("nb5.0", &ctx(&[], "networkbox-nonfree"), None)
            .unwrap();
        assert!(!target.is_free);
        assert_eq!(target.build_target, "nb5.0-nonfree-candidate");
    }

    #[test]
    fn test_unrecognized_branch() {
        let resolver = resolver();
        for branch in ["master", "nb5.0-foobar", "nb5", "feature/nb5.0", "nb-rhel10", ""] {
            let err = resolver.resolve(branch, &ctx(&[], "networkbox"), None).unwrap_err();
            assert_eq!(
                err,
                ResolutionError::UnrecognizedBranch {
                    branch: branch.to_string()
                }
            );
        }
    }

    #[test]
    fn test_unsupported_family() {
        let resolver = resolver();
        for branch in ["nb-fedora20", "nb-master"] {
            let err = resolver.resolve(branch, &ctx(&[], "networkbox"), None).unwrap_err();
            assert_eq!(
                err,
                ResolutionError::UnsupportedBranchFamily {
                    branch: branch.to_string(),
                    distribution: "fedora".to_string(),
                }
            );
            assert_eq!(err.branch(), Some(branch));
            assert!(err.to_string().contains("the fedora branch"));
        }
    }

    #[test]
    fn test_downstream_rhel() {
        let target = resolver()
            .resolve("nb-rhel6", &ctx(&[], "networkbox"), None)
            .unwrap();
        assert_eq!(target.family, BranchFamily::Downstream);
        assert_eq!(target.dist_val, "6");
        assert_eq!(target.dist_var, "rhel");
        assert_eq!(target.dist_tag, "el6");
        assert_eq!(target.build_root.as_deref(), Some("epel-6-x86_64"));
        assert_eq!(target.build_target, "nb-rhel6-free-candidate");
    }

    #[test]
    fn test_downstream_epel() {
        let target = resolver()
            .resolve("nb-epel5", &ctx(&[], "networkbox"), None)
            .unwrap();
        assert_eq!(target.dist_tag, "el5");
        assert_eq!(target.build_root.as_deref(), Some("epel-5-x86_64"));
    }

    #[test]
    fn test_rolling_branch_lexicographic_footgun() {
        let repo = ctx(&["origin/nb5.0", "origin/nb5.1", "origin/nb5.9"], "networkbox");
        let target = resolver().resolve("nbplayground", &repo, None).unwrap();
        assert_eq!(target.family, BranchFamily::Rolling);
        assert_eq!(target.dist_val, "5.10");
        assert_eq!(target.dist_tag, "nb5.10");
        assert_eq!(target.build_root.as_deref(), Some("nbplayground-x86_64"));
        assert_eq!(target.build_target, "nbplayground-free-candidate");

        // nb5.10 sorts before nb5.9 as a string, so nb5.9 still wins
        let repo = ctx(
            &["origin/nb5.0", "origin/nb5.1", "origin/nb5.9", "origin/nb5.10"],
            "networkbox",
        );
        let target = resolver().resolve("nbplayground", &repo, None).unwrap();
        assert_eq!(target.dist_val, "5.10");
    }

    #[test]
    fn test_rolling_branch_numeric_order() {
        let resolver = Resolver::new(
            BranchRule::defaults(),
            ReleaseLineOrder::Numeric,
            "nbplayground",
        )
        .unwrap();
        let repo = ctx(&["origin/nb5.9", "origin/nb5.10"], "networkbox");
        let value = resolver
            .infer_next_release_line("nbplayground", &repo, None)
            .unwrap();
        assert_eq!(value, "5.11");
    }

    #[test]
    fn test_inference_fails_without_a_successor() {
        let latest = format!("origin/nb5.{}", u32::MAX);
        let repo = ctx(&["origin/nb5.0", &latest], "networkbox");
        let err = resolver().resolve("nbplayground", &repo, None).unwrap_err();
        assert!(matches!(err, ResolutionError::ReleaseLineUndeterminable { .. }));
        assert_eq!(err.branch(), Some("nbplayground"));
        assert!(err.to_string().contains("has no successor"));
    }

    #[test]
    fn test_inference_ignores_suffixed_branches() {
        let repo = ctx(&["origin/nb5.0", "origin/nb5.3-hotfix", "origin/master"], "networkbox");
        let value = resolver()
            .infer_next_release_line("nbplayground", &repo, None)
            .unwrap();
        assert_eq!(value, "5.1");
    }

    #[test]
    fn test_single_integer_release_lines() {
        let rules = vec![
            BranchRule::new(BranchFamily::ReleaseLine, r"nb(\d+)", "nbrs", "nb{dist_val}", None),
            BranchRule::new(BranchFamily::Rolling, "nbplayground", "nbrs", "nb{dist_val}", None),
        ];
        let resolver = Resolver::new(rules, ReleaseLineOrder::Lexicographic, "nbplayground").unwrap();
        let repo = ctx(&["origin/nb4", "origin/nb5"], "networkbox");
        let target = resolver.resolve("nbplayground", &repo, None).unwrap();
        assert_eq!(target.dist_val, "6");
        assert_eq!(target.dist_tag, "nb6");
        assert!(target.build_root.is_none());
    }

    #[test]
    fn test_next_pseudo_branch_targets_inferred_line() {
        let repo = ctx(&["origin/nb5.0", "origin/nb5.1"], "networkbox-nonfree");
        let target = resolver().resolve("nbnext", &repo, None).unwrap();
        assert_eq!(target.dist_val, "5.2");
        assert_eq!(target.build_target, "nb5.2-nonfree-candidate");
    }

    #[test]
    fn test_fallback_to_koji_dest_tag() {
        let koji = StaticTargets::new().with_target("nbplayground-free-candidate", "nb5.1-free");
        let target = resolver()
            .resolve("nbplayground", &ctx(&[], "networkbox"), Some(&koji))
            .unwrap();
        assert_eq!(target.dist_val, "5.1");
        assert_eq!(target.dist_tag, "nb5.1");
    }

    #[test]
    fn test_fallback_queries_nonfree_target() {
        let koji = StaticTargets::new().with_target("nbplayground-nonfree-candidate", "nb5.3-nonfree");
        let value = resolver()
            .infer_next_release_line("nbplayground", &ctx(&[], "networkbox-nonfree"), Some(&koji))
            .unwrap();
        assert_eq!(value, "5.3");
    }

    #[test]
    fn test_fallback_unreachable() {
        let err = resolver()
            .resolve("nbplayground", &ctx(&[], "networkbox"), Some(&Unreachable))
            .unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::ReleaseLineUndeterminable { ref branch, .. } if branch == "nbplayground"
        ));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_fallback_without_service() {
        let err = resolver()
            .resolve("nbplayground", &ctx(&[], "networkbox"), None)
            .unwrap_err();
        assert!(matches!(err, ResolutionError::ReleaseLineUndeterminable { .. }));
    }

    #[test]
    fn test_fallback_rejects_garbage_tag() {
        let koji = StaticTargets::new().with_target("nbplayground-free-candidate", "trash");
        let err = resolver()
            .resolve("nbplayground", &ctx(&[], "networkbox"), Some(&koji))
            .unwrap_err();
        assert!(matches!(err, ResolutionError::ReleaseLineUndeterminable { .. }));
    }

    #[test]
    fn test_first_rule_wins() {
        let rules = vec![
            BranchRule::new(BranchFamily::Downstream, r"nb(\d+\.\d+)", "custom", "c{dist_val}", None),
            BranchRule::new(BranchFamily::ReleaseLine, r"nb(\d+\.\d+)", "nbrs", "nb{dist_val}", None),
        ];
        let resolver = Resolver::new(rules, ReleaseLineOrder::Lexicographic, "nbplayground").unwrap();
        let target = resolver.resolve("nb5.0", &ctx(&[], "networkbox"), None).unwrap();
        assert_eq!(target.dist_var, "custom");
        assert_eq!(target.dist_tag, "c5.0");
    }

    #[test]
    fn test_rule_without_capture_is_invalid_for_release_lines() {
        let rules = vec![BranchRule::new(BranchFamily::ReleaseLine, "stable", "nbrs", "nb", None)];
        let resolver = Resolver::new(rules, ReleaseLineOrder::Lexicographic, "nbplayground").unwrap();
        let err = resolver.resolve("stable", &ctx(&[], "networkbox"), None).unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidRule { .. }));
    }

    #[test]
    fn test_local_arch_is_not_empty() {
        assert!(!local_arch().is_empty());
    }
}
