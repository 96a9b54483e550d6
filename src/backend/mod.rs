// Copyright 2025 coScene
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

// Data backend module
//
// A trait-based abstraction over the hosted Postgres backend, so the radar
// store can talk to Supabase (PostgREST + realtime) or to an in-process
// memory backend with the same query semantics.

pub mod backend;
pub mod factory;
pub mod memory;
pub mod realtime;
pub mod supabase;

pub use backend::{DataBackend, QueryResult};
pub use factory::BackendFactory;
pub use memory::MemoryBackend;
pub use realtime::RealtimeClient;
pub use supabase::{parse_content_range, SupabaseBackend};
