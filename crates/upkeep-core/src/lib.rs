mod package_ref;
mod update;

pub use package_ref::{PackageRef, RefKind};
pub use update::{parse_update_list, total_download_size, UpdateDescriptor, UpdateOperation};

#[cfg(test)]
mod tests;
