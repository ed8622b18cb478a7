//! Address route handlers.

use axum::{Json, extract::State};
use greencart_core::address::{Address, NewAddress, PostalAddress};
use greencart_core::store::AddressStore;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddAddressForm {
    pub address: PostalAddress,
}

#[derive(Debug, Serialize)]
pub struct AddressAdded {
    pub success: bool,
    pub message: &'static str,
    pub address: Address,
}

#[derive(Debug, Serialize)]
pub struct AddressList {
    pub success: bool,
    pub addresses: Vec<Address>,
}

/// `POST /api/address/add`
#[instrument(skip(state, form), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<AddAddressForm>,
) -> Result<Json<AddressAdded>> {
    form.address.validate()?;

    let address = state
        .addresses()
        .insert(NewAddress {
            user_id: user.id,
            postal: form.address,
        })
        .await?;
    info!(address_id = %address.id, "Address added");

    Ok(Json(AddressAdded {
        success: true,
        message: "Address added successfully",
        address,
    }))
}

/// `GET /api/address/get`
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<AddressList>> {
    let addresses = state.addresses().list_for_user(user.id).await?;
    Ok(Json(AddressList {
        success: true,
        addresses,
    }))
}
