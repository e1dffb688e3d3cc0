//! 数据模型模块
//! 用户（出版者）、图书与认证请求/响应

pub mod auth;
pub mod book;
pub mod user;
