//! Build script wiring migration files into Cargo's change detection.
//!
//! `embed_migrations!` reads the `migrations` directory at compile time, but
//! Cargo has no way of knowing the macro depends on those files. Emitting a
//! `rerun-if-changed` directive makes incremental builds notice new or edited
//! migrations.

fn main() {
    println!("cargo:rerun-if-changed=migrations");
}
