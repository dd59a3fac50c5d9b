pub mod auth;
pub mod catalog;
pub mod media;
pub mod memory;
pub mod mirror;
pub mod notification;
pub mod product;
pub mod spreadsheet;
pub mod store;
pub mod surreal;
pub mod views;

// 重新导出常用类型
pub use auth::AuthService;
pub use catalog::CatalogService;
pub use media::MediaService;
pub use memory::MemoryStore;
pub use mirror::LiveMirror;
pub use notification::NotificationService;
pub use product::ProductService;
pub use spreadsheet::SpreadsheetService;
pub use store::DocumentStore;
pub use surreal::SurrealStore;
