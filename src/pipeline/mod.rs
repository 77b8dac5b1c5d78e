//! Authenticated request pipeline.
//!
//! Every API call funnels through [`ApiClient::send`]:
//!
//! 1. standing credentials are attached (cookie store, optional legacy bearer);
//! 2. the response is classified into an [`Outcome`];
//! 3. a credential expiry while signed in triggers one reissue and one replay;
//! 4. anything else is returned as an error and, for network failures and
//!    server messages, published to the [`Notifier`](crate::Notifier).
//!
//! ```rust,ignore
//! use otd_client::{ApiClient, ApiRequest};
//!
//! let posts: serde_json::Value = client
//!     .send_json(&ApiRequest::get("/community/posts").with_query("page", 0))
//!     .await?;
//! ```

mod client;
mod identity;
mod outcome;
mod request;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

pub use client::ApiClient;
pub use identity::{
    MEMBER_ID_HEADER, USER_ID_HEADER, USER_NICKNAME_HEADER, USER_ROLES_HEADER, identity_headers,
    member_header,
};
pub use outcome::{ApiResponse, Outcome, extract_message};
pub use request::{ApiRequest, Attempt};
pub use transport::{PreparedRequest, RawResponse, ReqwestTransport, Transport, TransportError};

/// Re-export of the HTTP method type used by [`ApiRequest`].
pub use reqwest::Method;
