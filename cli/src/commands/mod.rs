pub mod advert;
pub mod cluster;
pub mod dag;
