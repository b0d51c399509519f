//! Customer route handlers.

use abc_retail_core::{CustomerInput, CustomerRecord, new_row_key};
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect},
};
use tracing::{debug, instrument};

use crate::error::Result;
use crate::state::AppState;

/// One customer as shown in the listing.
pub struct CustomerRow {
    pub name: String,
    pub email: String,
    pub address: String,
}

impl From<CustomerRecord> for CustomerRow {
    fn from(record: CustomerRecord) -> Self {
        Self {
            name: record.name.unwrap_or_default(),
            email: record.email.unwrap_or_default(),
            address: record.address.unwrap_or_default(),
        }
    }
}

/// Customer listing template.
#[derive(Template, WebTemplate)]
#[template(path = "customers/index.html")]
pub struct CustomersTemplate {
    pub customers: Vec<CustomerRow>,
}

/// Display every customer.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let customers = state.storage().list_customers().await?;
    Ok(CustomersTemplate {
        customers: customers.into_iter().map(CustomerRow::from).collect(),
    })
}

/// Handle customer form submission.
#[instrument(skip(state, form))]
pub async fn create(
    State(state): State<AppState>,
    Form(form): Form<CustomerInput>,
) -> Result<Redirect> {
    match form.validate() {
        Ok(draft) => {
            let customer = draft.into_record(new_row_key());
            state.storage().upsert_customer(&customer).await?;
            tracing::info!(row_key = %customer.row_key, "Customer saved");
        }
        Err(e) => debug!(error = %e, "Customer form rejected"),
    }
    Ok(Redirect::to("/customers"))
}
