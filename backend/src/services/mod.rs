//! Business logic services for the Pescadería sales backend

pub mod inventory;
pub mod product;
pub mod reporting;
pub mod sale;

pub use product::{CreateProductInput, ProductService, UpdateProductInput};
pub use reporting::ReportingService;
pub use sale::{CancelOutcome, CreateSaleInput, EditSaleInput, SaleService};
