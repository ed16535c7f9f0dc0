//! OAuth 接口处理模块。

mod callback;
mod http;
mod install;

pub(crate) use http::{
    app_token_handler, app_token_status_handler, callback_handler, credentials_handler,
    index_handler, install_handler,
};
