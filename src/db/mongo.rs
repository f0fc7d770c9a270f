use log::{info, warn};
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    error::{Error, TRANSIENT_TRANSACTION_ERROR},
    options::{ClientOptions, ReturnDocument, ServerApi, ServerApiVersion},
    Client, ClientSession, Collection,
};
use std::sync::Arc;
use std::time::Duration;

use crate::db::trip_store::{assign_orders, TripStore};
use crate::error::StoreError;
use crate::models::trip::{Activity, City, CommitBatch, CommitReceipt, Stop, Trip};

pub const DEFAULT_DATABASE: &str = "Planner";
const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

pub async fn create_mongo_client(uri: &str, database: &str) -> Result<Arc<Client>, Error> {
    info!("Connecting to MongoDB");

    let mut client_options = ClientOptions::parse(uri).await?;
    client_options.connect_timeout = Some(Duration::from_secs(10));
    client_options.server_selection_timeout = Some(Duration::from_secs(10));
    client_options.max_pool_size = Some(10);
    client_options.min_pool_size = Some(1);

    let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
    client_options.server_api = Some(server_api);

    let client = Client::with_options(client_options)?;

    match client.database(database).run_command(doc! {"ping": 1}).await {
        Ok(_) => info!("Connected to MongoDB database {}", database),
        Err(e) => warn!(
            "Connected to MongoDB but ping failed: {}. Commits may fail until it recovers",
            e
        ),
    }

    Ok(Arc::new(client))
}

/// MongoDB-backed trip graph. Commits run in a multi-document transaction, so
/// the deployment must be a replica set or sharded cluster.
#[derive(Clone)]
pub struct MongoTripStore {
    client: Arc<Client>,
    database: String,
}

impl MongoTripStore {
    pub fn new(client: Arc<Client>, database: &str) -> Self {
        Self {
            client,
            database: database.to_string(),
        }
    }

    fn trips(&self) -> Collection<Trip> {
        self.client.database(&self.database).collection("Trips")
    }

    fn stops(&self) -> Collection<Stop> {
        self.client.database(&self.database).collection("Stops")
    }

    fn activities(&self) -> Collection<Activity> {
        self.client.database(&self.database).collection("Activities")
    }

    fn cities(&self) -> Collection<City> {
        self.client.database(&self.database).collection("Cities")
    }

    async fn write_batch(
        &self,
        batch: &mut CommitBatch,
        session: &mut ClientSession,
    ) -> Result<CommitReceipt, StoreError> {
        let max_existing = self
            .stops()
            .find_one(doc! { "trip_id": batch.trip_id })
            .sort(doc! { "order": -1 })
            .session(&mut *session)
            .await?
            .map(|stop| stop.order)
            .unwrap_or(0);

        // Reserving the order range is a single atomic update of the trip, so
        // concurrent commits to the same trip conflict here instead of
        // producing duplicate orders.
        let stop_count = batch.stops.len() as i32;
        let updated = self
            .trips()
            .find_one_and_update(
                doc! { "_id": batch.trip_id },
                vec![trip_update_stage(batch, max_existing, stop_count)],
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or(StoreError::TripVanished(batch.trip_id))?;

        let last_order = updated.stop_order_seq.unwrap_or(stop_count);
        let receipt = assign_orders(batch, last_order - stop_count + 1);

        if !batch.new_cities.is_empty() {
            self.cities()
                .insert_many(&batch.new_cities)
                .session(&mut *session)
                .await?;
        }
        if !batch.stops.is_empty() {
            self.stops()
                .insert_many(&batch.stops)
                .session(&mut *session)
                .await?;
        }
        if !batch.activities.is_empty() {
            self.activities()
                .insert_many(&batch.activities)
                .session(&mut *session)
                .await?;
        }

        Ok(receipt)
    }
}

fn trip_update_stage(batch: &CommitBatch, max_existing: i32, stop_count: i32) -> Document {
    let update = &batch.trip_update;
    let mut set = doc! {
        "stop_order_seq": {
            "$add": [
                { "$max": [ { "$ifNull": ["$stop_order_seq", 0] }, max_existing ] },
                stop_count
            ]
        },
        "name": { "$literal": update.name.as_str() },
        "description": { "$literal": update.description.as_str() },
        "updated_at": DateTime::now(),
    };
    if let Some(budget) = update.budget_if_unset {
        set.insert("budget", doc! { "$ifNull": ["$budget", budget] });
    }
    doc! { "$set": set }
}

impl TripStore for MongoTripStore {
    async fn find_trip(&self, trip_id: &ObjectId) -> Result<Option<Trip>, StoreError> {
        Ok(self.trips().find_one(doc! { "_id": *trip_id }).await?)
    }

    async fn find_city_by_name(&self, name: &str) -> Result<Option<City>, StoreError> {
        let pattern = format!("^{}$", regex::escape(name));
        Ok(self
            .cities()
            .find_one(doc! { "name": { "$regex": pattern, "$options": "i" } })
            .await?)
    }

    async fn apply_commit(&self, batch: CommitBatch) -> Result<CommitReceipt, StoreError> {
        let mut session = self.client.start_session().await?;
        let mut attempt = 1;

        loop {
            let mut working = batch.clone();
            session.start_transaction().await?;

            let result = match self.write_batch(&mut working, &mut session).await {
                Ok(receipt) => session
                    .commit_transaction()
                    .await
                    .map(|_| receipt)
                    .map_err(StoreError::from),
                Err(err) => {
                    if let Err(abort_err) = session.abort_transaction().await {
                        warn!("Failed to abort itinerary commit transaction: {}", abort_err);
                    }
                    Err(err)
                }
            };

            match result {
                Err(StoreError::Database(err))
                    if err.contains_label(TRANSIENT_TRANSACTION_ERROR)
                        && attempt < MAX_TRANSACTION_ATTEMPTS =>
                {
                    warn!(
                        "Itinerary commit for trip {} hit a transient conflict (attempt {}): {}",
                        batch.trip_id, attempt, err
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
