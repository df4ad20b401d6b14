use tracing::{Span, field, info, instrument};

use stockflow_core::DomainError;
use stockflow_parties::{Counterparty, CounterpartyId, NewCounterparty};
use stockflow_products::{NewProduct, Product, ProductId, ProductUpdate};

use super::Engine;
use crate::context::RequestContext;
use crate::error::EngineResult;
use crate::store::{EngineStore, EngineTx};

impl<S: EngineStore> Engine<S> {
    #[instrument(skip(self, ctx, input), fields(business_id = %ctx.business_id, product_id), err)]
    pub async fn register_product(
        &self,
        ctx: &RequestContext,
        input: NewProduct,
    ) -> EngineResult<Product> {
        let mut tx = self.open(ctx).await?;
        if let Some(counterparty_id) = input.counterparty_id {
            if tx.counterparty(counterparty_id).await?.is_none() {
                return Err(DomainError::not_found().into());
            }
        }

        let product = Product::register(ctx.business_id, input, self.now())?;
        tx.insert_product(&product).await?;
        tx.commit().await?;

        Span::current().record("product_id", field::display(product.id));
        info!(name = %product.name, "product registered");
        Ok(product)
    }

    /// Edit name, price or reorder level. Identity fields never change.
    #[instrument(skip(self, ctx, update), fields(business_id = %ctx.business_id, product_id = %product_id), err)]
    pub async fn update_product(
        &self,
        ctx: &RequestContext,
        product_id: ProductId,
        update: ProductUpdate,
    ) -> EngineResult<Product> {
        let mut tx = self.open(ctx).await?;
        let mut product = tx.product(product_id).await?.ok_or_else(DomainError::not_found)?;
        product.update(update)?;
        tx.update_product(&product).await?;
        tx.commit().await?;
        Ok(product)
    }

    pub async fn product(&self, ctx: &RequestContext, product_id: ProductId) -> EngineResult<Product> {
        let mut tx = self.open(ctx).await?;
        Ok(tx.product(product_id).await?.ok_or_else(DomainError::not_found)?)
    }

    pub async fn products(&self, ctx: &RequestContext) -> EngineResult<Vec<Product>> {
        let mut tx = self.open(ctx).await?;
        Ok(tx.products().await?)
    }

    #[instrument(skip(self, ctx, input), fields(business_id = %ctx.business_id, counterparty_id), err)]
    pub async fn register_counterparty(
        &self,
        ctx: &RequestContext,
        input: NewCounterparty,
    ) -> EngineResult<Counterparty> {
        let mut tx = self.open(ctx).await?;
        let counterparty = Counterparty::register(ctx.business_id, input, self.now())?;
        tx.insert_counterparty(&counterparty).await?;
        tx.commit().await?;

        Span::current().record("counterparty_id", field::display(counterparty.id));
        info!(kind = %counterparty.kind, "counterparty registered");
        Ok(counterparty)
    }

    pub async fn counterparty(
        &self,
        ctx: &RequestContext,
        counterparty_id: CounterpartyId,
    ) -> EngineResult<Counterparty> {
        let mut tx = self.open(ctx).await?;
        Ok(tx
            .counterparty(counterparty_id)
            .await?
            .ok_or_else(DomainError::not_found)?)
    }
}
