// The stock ledger: sole writer of balance rows
pub mod ledger;

// Transactional workflows over the ledger
pub mod adjustments;
pub mod receiving;
pub mod shipping;
pub mod transfers;

// Order lifecycles feeding the workflows
pub mod purchasing;
pub mod sales;

// Reference data the workflows read
pub mod catalog;
pub mod topology;
