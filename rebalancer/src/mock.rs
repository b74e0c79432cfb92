//! Mock fund for testing: implements [`FundGateway`] with configurable
//! behavior.
//!
//! ```
//! use whackrock_rebalancer::mock::MockFund;
//!
//! let fund = MockFund::builder()
//!     .with_asset("VIRTUAL", 5000)
//!     .with_asset("cbBTC", 3000)
//!     .with_asset("USDC", 2000)
//!     .with_target(vec![5000, 3000, 2000])
//!     .build();
//! ```

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use whackrock::BasisPointVector;

use crate::fund::{Composition, FundAsset, FundError, FundGateway, FundResult, Submission};

/// How the mock fund handles submissions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SubmitMode {
    /// Submissions succeed and become the stored target.
    #[default]
    Accept,
    /// All submissions are rejected.
    Reject,
}

/// Builder for `MockFund`.
pub struct MockFundBuilder {
    address: String,
    assets: Vec<FundAsset>,
    target: Vec<u32>,
    submit_mode: SubmitMode,
    fail_reads: bool,
}

impl MockFundBuilder {
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_asset(mut self, symbol: &str, current_bps: u32) -> Self {
        self.assets.push(FundAsset {
            symbol: symbol.to_string(),
            address: None,
            current_bps,
            value_cents: None,
        });
        self
    }

    /// Asset with a USD value; bps are taken as given.
    pub fn with_valued_asset(mut self, symbol: &str, current_bps: u32, value_cents: i64) -> Self {
        self.assets.push(FundAsset {
            symbol: symbol.to_string(),
            address: None,
            current_bps,
            value_cents: Some(value_cents),
        });
        self
    }

    pub fn with_target(mut self, target: Vec<u32>) -> Self {
        self.target = target;
        self
    }

    pub fn submit_mode(mut self, mode: SubmitMode) -> Self {
        self.submit_mode = mode;
        self
    }

    /// Every read returns `FundError::Read`.
    pub fn fail_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn build(self) -> MockFund {
        MockFund {
            address: self.address,
            assets: self.assets,
            target: Mutex::new(self.target),
            submit_mode: self.submit_mode,
            fail_reads: self.fail_reads,
            submissions: Mutex::new(Vec::new()),
        }
    }
}

/// A mock fund that records submissions and returns configurable responses.
pub struct MockFund {
    address: String,
    assets: Vec<FundAsset>,
    target: Mutex<Vec<u32>>,
    submit_mode: SubmitMode,
    fail_reads: bool,
    submissions: Mutex<Vec<BasisPointVector>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockFund {
    pub fn builder() -> MockFundBuilder {
        MockFundBuilder {
            address: "0xmock".into(),
            assets: Vec::new(),
            target: Vec::new(),
            submit_mode: SubmitMode::Accept,
            fail_reads: false,
        }
    }

    /// All weight vectors submitted so far (for assertion in tests).
    pub fn submissions(&self) -> Vec<BasisPointVector> {
        lock(&self.submissions).clone()
    }

    fn check_reads(&self) -> FundResult<()> {
        if self.fail_reads {
            return Err(FundError::Read("mock: fund unreachable".into()));
        }
        Ok(())
    }
}

impl FundGateway for MockFund {
    fn current_composition(&self) -> FundResult<Composition> {
        self.check_reads()?;
        Ok(Composition {
            assets: self.assets.clone(),
        })
    }

    fn target_composition(&self) -> FundResult<Vec<u32>> {
        self.check_reads()?;
        Ok(lock(&self.target).clone())
    }

    fn set_weights_and_rebalance(&self, weights: &BasisPointVector) -> FundResult<Submission> {
        lock(&self.submissions).push(weights.clone());

        match self.submit_mode {
            SubmitMode::Reject => Err(FundError::Rejected("mock: submission rejected".into())),
            SubmitMode::Accept => {
                *lock(&self.target) = weights.as_slice().to_vec();
                let submitted_at = Utc::now();
                Ok(Submission {
                    request_id: format!("{}-{}", self.address, submitted_at.timestamp_millis()),
                    fund: self.address.clone(),
                    weights: weights.clone(),
                    submitted_at,
                })
            }
        }
    }
}
