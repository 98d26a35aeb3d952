pub mod claim_flow;
pub mod eligibility;
pub mod session;
pub mod solana_client;
