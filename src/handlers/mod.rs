pub mod activities;
pub mod crop_daily;
pub mod crops;
pub mod expenses;
pub mod farm_expect;
pub mod farms;
pub mod harvest;
pub mod methods;
pub mod users;
