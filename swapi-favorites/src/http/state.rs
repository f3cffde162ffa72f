use std::sync::Arc;

use crate::auth::TokenIssuer;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(store: Store, tokens: TokenIssuer) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
        }
    }
}
