pub mod paystack;
pub mod reconciliation;
pub mod stripe;
