pub mod expression;
pub mod drug_response;
pub mod clinical_response;
