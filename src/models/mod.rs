use crate::pipeline::timestamp::Timestamp;

/// Base for registry file ids (attachments and lot images)
pub const FILE_STORE_URL: &str = "https://torgi.gov.ru/new/file-store/v1/";
/// Base for the public lot card page
pub const LOT_PAGE_URL: &str = "https://torgi.gov.ru/new/public/lots/lot/";

/// Geographic coordinates in EPSG:4326
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
}

/// Downloadable document attached to a lot
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Auction metadata from the per-lot detail document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailBundle {
    pub auction_start_date: Option<String>,
    pub bid_start_date: Option<String>,
    pub auction_link: Option<String>,
    pub price_step: Option<f64>,
    pub deposit_price: Option<f64>,
    pub files: Vec<Attachment>,
}

/// One land-parcel tender listing
#[derive(Debug, Clone)]
pub struct LotRecord {
    pub id: String,
    pub lot_name: Option<String>,
    pub lot_description: Option<String>,
    pub cadastral_number: Option<String>,
    pub category: Option<String>,
    pub bid_type: Option<String>,
    pub bid_form: Option<String>,
    pub subject: Option<String>,
    pub area: Option<String>,
    pub rent_period: Option<String>,
    pub create_date: Option<Timestamp>,
    pub bid_end_time: Option<Timestamp>,
    pub auction_start_date: Option<Timestamp>,
    pub bid_start_date: Option<Timestamp>,
    /// Minutes east of UTC; only meaningful until timestamps are normalized
    pub timezone_offset: Option<i64>,
    pub timezone_name: Option<String>,
    pub coords_center: Option<Coordinates>,
    pub address: Option<String>,
    pub price_min: Option<f64>,
    pub price_step: Option<f64>,
    pub deposit_price: Option<f64>,
    pub files: Vec<Attachment>,
    pub images: Vec<String>,
    pub link: String,
    pub auction_link: Option<String>,
    pub cadastral_map_link: Option<String>,
}

impl LotRecord {
    /// Both fields the final dataset requires
    pub fn is_complete(&self) -> bool {
        self.coords_center.is_some() && self.cadastral_number.is_some()
    }

    pub fn apply_details(&mut self, details: DetailBundle) {
        self.auction_start_date = details.auction_start_date.map(Timestamp::Raw);
        self.bid_start_date = details.bid_start_date.map(Timestamp::Raw);
        self.auction_link = details.auction_link;
        self.price_step = details.price_step;
        self.deposit_price = details.deposit_price;
        self.files = details.files;
    }
}

/// Public cadastral map link centred on the lot.
///
/// Every part of the cadastral number is re-read as an integer, which drops
/// leading zeros the map's search box does not accept.
pub fn cadastral_map_link(coords: Option<Coordinates>, cadastral_number: &str) -> Option<String> {
    let coords = coords?;
    let parts = cadastral_number
        .split(':')
        .map(|part| part.trim().parse::<u64>().map(|n| n.to_string()))
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let number = parts.join(":");

    Some(format!(
        "https://pkk.rosreestr.ru/#/search/{},{}/19/@5w3tqw5ca?text={}&opened={}",
        coords.lat, coords.lon, number, number
    ))
}
