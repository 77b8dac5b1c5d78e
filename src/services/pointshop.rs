use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{field, i64_field, items, payload, shape_error, str_field};
use crate::error::Error;
use crate::pipeline::{ApiClient, ApiRequest, Transport};
use crate::types::ItemId;

const PATH: &str = "/pointshop";

/// Point shop item as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[non_exhaustive]
pub struct ShopItem {
    pub id: ItemId,
    pub name: String,
    pub price: i64,
    pub category_id: Option<i64>,
    pub image: Option<String>,
}

impl ShopItem {
    #[must_use]
    pub fn new(id: ItemId, name: impl Into<String>, price: i64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            category_id: None,
            image: None,
        }
    }
}

/// Normalize one item payload. Items without an id are skipped.
#[must_use]
pub fn normalize_item(raw: &JsonValue) -> Option<ShopItem> {
    let id = i64_field(raw, &["pointId", "itemId", "id"])?;
    Some(ShopItem {
        id: ItemId(id),
        name: str_field(raw, &["name", "pointItemName", "itemName"]).unwrap_or_default(),
        price: i64_field(raw, &["price", "pointScore"]).unwrap_or(0),
        category_id: i64_field(raw, &["pointCategoryId", "categoryId"]),
        image: str_field(raw, &["image", "imageUrl", "pointItemImage"]),
    })
}

/// Item list, optionally narrowed to one category.
///
/// # Errors
///
/// Pipeline errors.
pub async fn fetch_items<T: Transport>(
    client: &ApiClient<T>,
    category_id: Option<i64>,
    page: u32,
    size: u32,
) -> Result<Vec<ShopItem>, Error> {
    let mut request = ApiRequest::get(format!("{PATH}/list"))
        .with_query("page", page)
        .with_query("size", size);
    if let Some(category) = category_id {
        request = request.with_query("pointCategoryId", category);
    }
    let body: JsonValue = client.send_json(&request).await?;
    Ok(items(payload(&body)).iter().filter_map(normalize_item).collect())
}

/// Keyword search over item names.
///
/// # Errors
///
/// Pipeline errors.
pub async fn search_items<T: Transport>(
    client: &ApiClient<T>,
    keyword: &str,
) -> Result<Vec<ShopItem>, Error> {
    let request = ApiRequest::get(format!("{PATH}/keyword")).with_query("keyword", keyword);
    let body: JsonValue = client.send_json(&request).await?;
    Ok(items(payload(&body)).iter().filter_map(normalize_item).collect())
}

/// Current point balance of the signed-in user.
///
/// # Errors
///
/// Pipeline errors, or [`Error::Decode`] if the payload has no balance.
pub async fn fetch_balance<T: Transport>(client: &ApiClient<T>) -> Result<i64, Error> {
    let body: JsonValue = client
        .send_json(&ApiRequest::get(format!("{PATH}/user/points")))
        .await?;
    i64_field(payload(&body), &["pointBalance", "point", "balance"])
        .ok_or_else(|| shape_error("point balance missing from response"))
}

/// Ids of every item the signed-in user already owns.
///
/// # Errors
///
/// Pipeline errors.
pub async fn fetch_purchase_history<T: Transport>(
    client: &ApiClient<T>,
) -> Result<Vec<ItemId>, Error> {
    let body: JsonValue = client
        .send_json(&ApiRequest::get(format!("{PATH}/purchase/history")))
        .await?;
    Ok(items(payload(&body))
        .iter()
        .filter_map(|p| i64_field(p, &["itemId", "pointId"]).map(ItemId))
        .collect())
}

/// Local view of the shop: catalogue, balance and owned items.
///
/// Purchases are checked locally first and reconciled locally after the
/// backend confirms, so the view stays consistent without a refetch.
#[derive(Debug, Default)]
pub struct PointShop {
    items: Vec<ShopItem>,
    balance: i64,
    purchased: HashSet<ItemId>,
}

impl PointShop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn items(&self) -> &[ShopItem] {
        &self.items
    }

    #[must_use]
    pub fn balance(&self) -> i64 {
        self.balance
    }

    #[must_use]
    pub fn is_purchased(&self, id: ItemId) -> bool {
        self.purchased.contains(&id)
    }

    /// Reload the catalogue.
    ///
    /// # Errors
    ///
    /// Pipeline errors. The cached catalogue is kept on failure.
    pub async fn load_items<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        category_id: Option<i64>,
    ) -> Result<&[ShopItem], Error> {
        self.items = fetch_items(client, category_id, 0, 20).await?;
        Ok(&self.items)
    }

    /// Reload the balance and mirror it into the session.
    ///
    /// # Errors
    ///
    /// Pipeline errors.
    pub async fn load_balance<T: Transport>(&mut self, client: &ApiClient<T>) -> Result<i64, Error> {
        self.balance = fetch_balance(client).await?;
        if let Err(e) = client.session().set_point(self.balance) {
            tracing::warn!(error = %e, "Persisting point balance failed");
        }
        Ok(self.balance)
    }

    /// Reload the set of owned items.
    ///
    /// # Errors
    ///
    /// Pipeline errors.
    pub async fn load_purchases<T: Transport>(&mut self, client: &ApiClient<T>) -> Result<(), Error> {
        self.purchased = fetch_purchase_history(client).await?.into_iter().collect();
        Ok(())
    }

    /// Buy `item`.
    ///
    /// # Errors
    ///
    /// [`Error::Rejected`] if the item is already owned or the balance is too
    /// low (no request is sent), otherwise pipeline errors.
    pub async fn purchase<T: Transport>(
        &mut self,
        client: &ApiClient<T>,
        item: &ShopItem,
    ) -> Result<(), Error> {
        if self.is_purchased(item.id) {
            return Err(Error::Rejected("이미 구매한 아이템입니다.".into()));
        }
        if self.balance < item.price {
            return Err(Error::Rejected("포인트가 부족합니다.".into()));
        }

        let response = client
            .send(&ApiRequest::post(format!("{PATH}/purchase/{}", item.id)))
            .await?;

        self.purchased.insert(item.id);
        // Trust a balance echoed by the backend over local arithmetic.
        let echoed = response
            .value()
            .ok()
            .and_then(|body| i64_field(payload(&body), &["pointBalance", "balance"]));
        self.balance = echoed.unwrap_or(self.balance - item.price);
        if let Err(e) = client.session().set_point(self.balance) {
            tracing::warn!(error = %e, "Persisting point balance failed");
        }
        tracing::info!(item_id = %item.id, balance = self.balance, "Point item purchased");
        Ok(())
    }
}

/// Top-up request body for `POST /pointshop/charge`.
#[derive(Debug, Clone, Serialize)]
struct Charge {
    amount: i64,
}

/// Add points to the signed-in user's balance. Returns the new balance when
/// the backend reports one.
///
/// # Errors
///
/// [`Error::Rejected`] for a non-positive amount, otherwise pipeline errors.
pub async fn charge_points<T: Transport>(
    client: &ApiClient<T>,
    amount: i64,
) -> Result<Option<i64>, Error> {
    if amount <= 0 {
        return Err(Error::Rejected("충전 금액은 0보다 커야 합니다.".into()));
    }
    let request = ApiRequest::post(format!("{PATH}/charge")).with_json(&Charge { amount })?;
    let response = client.send(&request).await?;
    let body = response.value()?;
    Ok(field(payload(&body), &["pointBalance", "balance"]).and_then(super::as_i64))
}
