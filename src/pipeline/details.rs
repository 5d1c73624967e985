use crate::error::{LotError, LotResult};
use crate::models::{Attachment, DetailBundle, FILE_STORE_URL};
use crate::scrapers::traits::RegistryApi;
use crate::scrapers::types::LotDetail;

impl From<LotDetail> for DetailBundle {
    fn from(detail: LotDetail) -> Self {
        Self {
            auction_start_date: detail.auction_start_date,
            bid_start_date: detail.bidd_start_time,
            auction_link: detail.etp_url,
            price_step: detail.price_step,
            deposit_price: detail.deposit,
            files: detail
                .lot_attachments
                .into_iter()
                .map(|a| Attachment {
                    url: format!("{}{}", FILE_STORE_URL, a.file_id),
                    name: a.file_name,
                })
                .collect(),
        }
    }
}

/// Auction metadata and attachments of one lot
pub async fn fetch_details(api: &dyn RegistryApi, lot_id: &str) -> LotResult<DetailBundle> {
    let document = api.lot_detail(lot_id).await.map_err(LotError::Request)?;
    let detail: LotDetail = serde_json::from_value(document)?;
    Ok(detail.into())
}
