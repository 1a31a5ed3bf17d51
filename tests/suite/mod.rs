mod durability;
mod handle;
mod properties;
