//! Holder-facing disclosure service

use chrono::NaiveDate;
use tracing::instrument;

use crate::condition::{Condition, ConditionKind};
use crate::config::ZkConfig;
use crate::disclosure::{Disclosure, DisclosureBuilder};
use crate::error::Result;
use crate::matcher::{ConditionMatcher, MatchResults};
use crate::prover::CredentialProver;
use crate::repository::CredentialRepository;

/// Evaluates and discloses conditions for holders of a credential repository
pub struct DisclosureService<R> {
    repository: R,
    matcher: ConditionMatcher,
    prover: CredentialProver,
    parallel: bool,
}

impl<R: CredentialRepository> DisclosureService<R> {
    /// Service over `repository`, proving with `prover`
    pub fn new(repository: R, matcher: ConditionMatcher, prover: CredentialProver) -> Self {
        Self {
            repository,
            matcher,
            prover,
            parallel: cfg!(feature = "parallel"),
        }
    }

    /// Build a service from configuration, computing ages as of today
    pub fn from_config(config: &ZkConfig, repository: R) -> Result<Self> {
        let prover = CredentialProver::new(&config.build_dir)?;
        let matcher = ConditionMatcher::default().with_policy(config.duplicate_policy);
        Ok(Self::new(repository, matcher, prover).with_parallel(config.parallel))
    }

    /// Prove selected conditions concurrently
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Compute ages as of `date` instead of today
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.matcher = ConditionMatcher::new(date).with_policy(self.matcher.policy());
        self
    }

    /// Prover used for disclosures
    pub fn prover(&self) -> &CredentialProver {
        &self.prover
    }

    /// Evaluate `conditions` against `holder`'s credentials
    #[instrument(skip(self, conditions))]
    pub fn evaluate(&self, holder: &str, conditions: &[Condition]) -> Result<MatchResults> {
        let credentials = self.repository.credentials_for(holder)?;
        Ok(self.matcher.evaluate(&credentials, conditions))
    }

    /// Evaluate `conditions` and disclose the `selection` of them
    #[instrument(skip(self, conditions, selection))]
    pub fn disclose(
        &self,
        holder: &str,
        conditions: &[Condition],
        selection: &[ConditionKind],
    ) -> Result<Disclosure> {
        let credentials = self.repository.credentials_for(holder)?;
        let results = self.matcher.evaluate(&credentials, conditions);
        DisclosureBuilder::new(&self.prover)
            .parallel(self.parallel)
            .build(&credentials, conditions, &results, selection)
    }
}
