// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::path::PathBuf;

pub struct Utils;

impl Utils {
    pub fn uuid() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Create a fresh directory under the system temp dir, unique for every call.
    pub fn test_sub_dir(name: impl AsRef<str>) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("iodine-test")
            .join(format!("{}-{}", name.as_ref(), Self::uuid()));
        let _ = std::fs::create_dir_all(&dir);
        dir
    }
}
