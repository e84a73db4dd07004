// SPDX-License-Identifier: MIT

pub mod machine;
pub mod resume;
pub mod step;
pub mod validate;
