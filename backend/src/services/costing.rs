//! Costing engine: values stock by replaying inbound movement history into
//! cost layers. Read-only.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    replay_pair_quantity, value_layers, CostLayer, CostingMethod, DataGapWarning, InboundLayer,
    PairKey, Product, MONEY_DP,
};
use crate::services::with_deadline;
use crate::store::{LedgerStore, MovementQuery, ProductCatalog, StockLevelFilter};

/// Valuation of one product in one warehouse
#[derive(Debug, Clone, Serialize)]
pub struct ValuationReport {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub method: CostingMethod,
    pub as_of: Option<DateTime<Utc>>,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_value: Decimal,
    pub layers: Vec<CostLayer>,
    /// Present when part of the stock had to be valued at catalog price
    pub warnings: Vec<DataGapWarning>,
}

/// Valuation of everything held in a warehouse
#[derive(Debug, Clone, Serialize)]
pub struct WarehouseValuation {
    pub warehouse_id: Uuid,
    pub method: CostingMethod,
    pub total_quantity: Decimal,
    pub total_value: Decimal,
    pub products: Vec<ValuationReport>,
}

#[derive(Clone)]
pub struct CostingEngine {
    store: Arc<dyn LedgerStore>,
    catalog: Arc<dyn ProductCatalog>,
}

impl CostingEngine {
    pub fn new(store: Arc<dyn LedgerStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { store, catalog }
    }

    /// Values a product × warehouse pair, optionally as it stood at `as_of`
    pub async fn value(
        &self,
        product_id: Uuid,
        warehouse_id: Uuid,
        method: CostingMethod,
        as_of: Option<DateTime<Utc>>,
        deadline: Option<Instant>,
    ) -> AppResult<ValuationReport> {
        with_deadline(deadline, "valuation", async {
            let product = self.product(product_id).await?;
            if self.store.get_warehouse(warehouse_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Warehouse {}", warehouse_id)));
            }
            self.value_pair(&product, warehouse_id, method, as_of).await
        })
        .await
    }

    /// Values every product with stock in the warehouse
    pub async fn value_warehouse(
        &self,
        warehouse_id: Uuid,
        method: CostingMethod,
        deadline: Option<Instant>,
    ) -> AppResult<WarehouseValuation> {
        with_deadline(deadline, "warehouse valuation", async {
            if self.store.get_warehouse(warehouse_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Warehouse {}", warehouse_id)));
            }

            let levels = self
                .store
                .list_stock_levels(StockLevelFilter::warehouse(warehouse_id))
                .await?;
            let stocked: BTreeSet<Uuid> = levels
                .iter()
                .filter(|l| l.quantity > Decimal::ZERO)
                .map(|l| l.product_id)
                .collect();

            let mut products = Vec::with_capacity(stocked.len());
            for product_id in stocked {
                let product = self.product(product_id).await?;
                products.push(self.value_pair(&product, warehouse_id, method, None).await?);
            }

            Ok(WarehouseValuation {
                warehouse_id,
                method,
                total_quantity: products.iter().map(|p| p.quantity).sum(),
                total_value: products
                    .iter()
                    .map(|p| p.total_value)
                    .sum::<Decimal>()
                    .round_dp(MONEY_DP),
                products,
            })
        })
        .await
    }

    async fn product(&self, product_id: Uuid) -> AppResult<Product> {
        self.catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))
    }

    async fn value_pair(
        &self,
        product: &Product,
        warehouse_id: Uuid,
        method: CostingMethod,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<ValuationReport> {
        let pair = PairKey::new(product.id, warehouse_id);
        let mut query = MovementQuery::new().for_pair(pair);
        if let Some(as_of) = as_of {
            query = query.until(as_of);
        }
        let history = self.store.list_movements(&query).await?;

        let quantity = match as_of {
            Some(_) => replay_pair_quantity(&history, product.id, warehouse_id),
            None => self.store.pair_quantity(pair).await?,
        };

        let layers: Vec<InboundLayer> = history
            .iter()
            .filter_map(|m| InboundLayer::from_movement(m, warehouse_id, product.unit_price))
            .collect();

        let valuation = value_layers(layers, quantity, method, product.unit_price)
            .map_err(|e| AppError::validation("quantity", e.to_string()))?;

        let mut warnings = Vec::new();
        if valuation.unexplained_quantity > Decimal::ZERO {
            tracing::warn!(
                product_id = %product.id,
                warehouse_id = %warehouse_id,
                method = method.as_str(),
                unexplained = %valuation.unexplained_quantity,
                "Inbound history does not cover stock on hand; using catalog price"
            );
            warnings.push(DataGapWarning::new(
                valuation.unexplained_quantity,
                product.unit_price,
            ));
        }

        Ok(ValuationReport {
            product_id: product.id,
            warehouse_id,
            method,
            as_of,
            quantity: valuation.quantity,
            unit_cost: valuation.unit_cost,
            total_value: valuation.total_value,
            layers: valuation.layers,
            warnings,
        })
    }
}
