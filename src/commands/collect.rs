use super::Host;
use super::common::{Common, CommonArgs};
use crate::Result;
use crate::collector::{Affiliation, Collector, UNKNOWN_DEVELOPER};
use crate::model::{ContributionEvent, RepoName, TimePeriod};
use crate::source::SourceCapability;
use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::Parser;
use ohno::{IntoAppError, bail};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// Repository to collect, as `owner/name` or a GitHub URL (repeatable)
    #[arg(long = "repo", short = 'r', value_name = "OWNER/NAME")]
    pub repos: Vec<String>,

    /// Organization whose repositories are collected when no repository is given
    #[arg(long, value_name = "ORG")]
    pub org: Option<String>,

    /// First day of the period (inclusive)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub since: NaiveDate,

    /// Last day of the period (inclusive)
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub until: NaiveDate,

    /// Ignore cached results and fetch everything fresh
    #[arg(long)]
    pub no_cache: bool,

    /// Classify every developer as organization member, outside collaborator, or external
    #[arg(long)]
    pub classify: bool,

    /// Write the JSON result to this file instead of standard output
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

#[derive(Debug, Serialize)]
struct CollectReport {
    period: TimePeriod,
    repositories: Vec<String>,
    events: Vec<ContributionEvent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    affiliations: Option<BTreeMap<String, Affiliation>>,

    warnings: Vec<String>,
}

pub fn collect_contributions<H: Host>(host: &mut H, common_args: &CommonArgs, args: &CollectArgs) -> Result<()> {
    let period = TimePeriod::from_dates(args.since, args.until)?;
    let common = Common::new(common_args)?;

    if !common.has_token() {
        let _ = writeln!(
            host.error(),
            "No GitHub token given; requests are unauthenticated and limited to 60 per hour"
        );
    }

    let org = args.org.clone().or_else(|| common.config.github.organization.clone());
    let collector = common.collector()?;
    let mut warnings = Vec::new();

    let repos = resolve_repositories(&collector, &args.repos, org.as_deref(), &mut warnings)?;

    let mut report = CollectReport {
        period,
        repositories: Vec::with_capacity(repos.len()),
        events: Vec::new(),
        affiliations: None,
        warnings: Vec::new(),
    };

    let mut developers: BTreeMap<String, RepoName> = BTreeMap::new();

    for repo in &repos {
        let collection = collector.collect(repo, &period, !args.no_cache);
        warnings.extend(collection.warnings);

        for event in &collection.events {
            if event.developer() != UNKNOWN_DEVELOPER {
                let _ = developers.entry(event.developer().to_string()).or_insert_with(|| repo.clone());
            }
        }

        report.repositories.push(repo.full_name());
        report.events.extend(collection.events);
    }

    if args.classify {
        if let Some(org) = org.as_deref() {
            report.affiliations = Some(
                developers
                    .iter()
                    .map(|(developer, repo)| (developer.clone(), collector.classify_developer(org, repo, developer)))
                    .collect(),
            );
        } else {
            warnings.push("developers were not classified because no organization was given".to_string());
        }
    }

    for warning in &warnings {
        let _ = writeln!(host.error(), "warning: {warning}");
    }

    report.warnings = warnings;
    let json = serde_json::to_string_pretty(&report)?;

    if let Some(path) = &args.output {
        fs::write(path, json).into_app_err_with(|| format!("writing results to '{path}'"))?;
        let _ = writeln!(
            host.error(),
            "Wrote {} events from {} repositories to {path}",
            report.events.len(),
            report.repositories.len()
        );
    } else {
        let _ = writeln!(host.output(), "{json}");
    }

    Ok(())
}

/// Named repositories are checked for existence and skipped with a warning when missing;
/// without any, the organization's repositories are listed.
fn resolve_repositories<S: SourceCapability>(
    collector: &Collector<S>,
    names: &[String],
    org: Option<&str>,
    warnings: &mut Vec<String>,
) -> Result<Vec<RepoName>> {
    if names.is_empty() {
        let Some(org) = org else {
            bail!("no repository given; pass --repo or --org, or set github.organization");
        };

        let listed = collector
            .organization_repositories(org)
            .into_app_err_with(|| format!("listing repositories of '{org}'"))?;

        return listed.iter().map(|info| RepoName::parse(&info.full_name)).collect();
    }

    let mut repos = Vec::with_capacity(names.len());
    for name in names {
        let repo = RepoName::parse(name)?;
        match collector.repository(&repo) {
            Ok(_) => repos.push(repo),
            Err(e) => warnings.push(format!("skipping '{repo}': {e}")),
        }
    }

    Ok(repos)
}
