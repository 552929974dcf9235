use crate::{
    country::CountryClient,
    server::{Result, ServerError, ServerRouter, extract::Json},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use std::sync::Arc;
use traveltales_common::model::country::CountryData;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_countries)
        .typed_get(get_country)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/countries", rejection(ServerError))]
struct CountriesPath();

async fn list_countries(
    CountriesPath(): CountriesPath,
    State(country): State<Arc<CountryClient>>,
) -> Result<Json<Vec<String>>> {
    let names = country.all_names().await?;

    Ok(Json(names))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/countries/{name}", rejection(ServerError))]
struct GetCountryPath {
    name: String,
}

async fn get_country(
    GetCountryPath { name }: GetCountryPath,
    State(country): State<Arc<CountryClient>>,
) -> Result<Json<CountryData>> {
    let data = country.lookup(&name).await?;

    Ok(Json(data))
}
