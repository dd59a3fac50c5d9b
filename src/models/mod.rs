pub mod auth;
pub mod catalog;
pub mod category;
pub mod media;
pub mod notification;
pub mod product;
pub mod response;
