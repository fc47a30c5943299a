use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::devices)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub last_seen: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::devices)]
pub struct NewDevice<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub last_seen: NaiveDateTime,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = crate::schema::readings)]
pub struct Reading {
    pub id: i64,
    pub device_id: String,
    pub voltage: f64,
    pub current: f64,
    pub battery_soh: f64,
    pub soh_measurement_time: Option<String>,
    pub ingested_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::readings)]
pub struct NewReading<'a> {
    pub device_id: &'a str,
    pub voltage: f64,
    pub current: f64,
    pub battery_soh: f64,
    pub soh_measurement_time: Option<&'a str>,
    pub ingested_at: NaiveDateTime,
}
