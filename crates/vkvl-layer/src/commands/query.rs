//! Query commands and host query reset.

use ash::vk;

use vkvl_core::TypedHandle;

use crate::cmd_buffer::CommandBuffer;
use crate::command::Func;
use crate::deferred::QueryUpdate;
use crate::error_sink::Location;
use crate::query::{QueryObject, QueryState};
use crate::validator::Validator;

impl Validator {
    pub fn pre_call_validate_cmd_begin_query(
        &self,
        command_buffer: vk::CommandBuffer,
        pool: vk::QueryPool,
        slot: u32,
        _flags: vk::QueryControlFlags,
    ) -> bool {
        let loc = Location::new(Func::CmdBeginQuery.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdBeginQuery);
            skip |= self.validate_query_slot(cb, pool, slot, &loc.dot("query"), "VUID-vkCmdBeginQuery-query-00802");
            let query = QueryObject::new(pool, slot);
            if cb.active_queries.contains_key(&query) {
                skip |= self.log_error(
                    "VUID-vkCmdBeginQuery-queryPool-01922",
                    &[cb.typed(), TypedHandle::new(pool)],
                    &loc,
                    format!("{} is already active in {}.", query, cb.typed()),
                );
            }
            skip
        })
    }

    pub fn post_call_record_cmd_begin_query(
        &self,
        command_buffer: vk::CommandBuffer,
        pool: vk::QueryPool,
        slot: u32,
        flags: vk::QueryControlFlags,
    ) {
        self.record_with(command_buffer, |cb| {
            let query = QueryObject::new(pool, slot);
            cb.add_binding(TypedHandle::new(pool));
            cb.active_queries.insert(query, flags);
            cb.query_updates.push(QueryUpdate::Begin { query });
        });
    }

    pub fn pre_call_validate_cmd_end_query(&self, command_buffer: vk::CommandBuffer, pool: vk::QueryPool, slot: u32) -> bool {
        let loc = Location::new(Func::CmdEndQuery.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdEndQuery);
            let query = QueryObject::new(pool, slot);
            if !cb.active_queries.contains_key(&query) {
                skip |= self.log_error(
                    "VUID-vkCmdEndQuery-None-01923",
                    &[cb.typed(), TypedHandle::new(pool)],
                    &loc,
                    format!("Ending a query before it was started: {}.", query),
                );
            }
            skip
        })
    }

    pub fn post_call_record_cmd_end_query(&self, command_buffer: vk::CommandBuffer, pool: vk::QueryPool, slot: u32) {
        self.record_with(command_buffer, |cb| {
            let query = QueryObject::new(pool, slot);
            cb.active_queries.remove(&query);
            // Inside a multiview instance one query per view is ended.
            let view_mask = cb.render_pass.as_ref().map(|rp| rp.view_mask()).unwrap_or(0);
            if view_mask != 0 && self.device().features().multiview {
                cb.query_updates.push(QueryUpdate::EndQueries {
                    pool,
                    first: slot,
                    count: view_mask.count_ones(),
                });
            } else {
                cb.query_updates.push(QueryUpdate::End { query });
            }
        });
    }

    pub fn pre_call_validate_cmd_reset_query_pool(
        &self,
        command_buffer: vk::CommandBuffer,
        pool: vk::QueryPool,
        first: u32,
        count: u32,
    ) -> bool {
        let loc = Location::new(Func::CmdResetQueryPool.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdResetQueryPool);
            skip |= self.validate_query_range(cb, pool, first, count, &loc);
            skip
        })
    }

    pub fn post_call_record_cmd_reset_query_pool(
        &self,
        command_buffer: vk::CommandBuffer,
        pool: vk::QueryPool,
        first: u32,
        count: u32,
    ) {
        self.record_with(command_buffer, |cb| {
            cb.add_binding(TypedHandle::new(pool));
            cb.query_updates.push(QueryUpdate::Reset { pool, first, count });
        });
    }

    pub fn pre_call_validate_cmd_write_timestamp(
        &self,
        command_buffer: vk::CommandBuffer,
        _stage: vk::PipelineStageFlags2,
        pool: vk::QueryPool,
        slot: u32,
    ) -> bool {
        let loc = Location::new(Func::CmdWriteTimestamp.name());
        self.validate_with(command_buffer, |cb| {
            let mut skip = self.validate_cmd(cb, Func::CmdWriteTimestamp);
            skip |= self.validate_query_slot(cb, pool, slot, &loc.dot("query"), "VUID-vkCmdWriteTimestamp-query-04904");
            skip
        })
    }

    pub fn post_call_record_cmd_write_timestamp(
        &self,
        command_buffer: vk::CommandBuffer,
        _stage: vk::PipelineStageFlags2,
        pool: vk::QueryPool,
        slot: u32,
    ) {
        self.record_with(command_buffer, |cb| {
            cb.add_binding(TypedHandle::new(pool));
            cb.query_updates.push(QueryUpdate::WriteTimestamp {
                query: QueryObject::new(pool, slot),
            });
        });
    }

    /// vkResetQueryPool from the host.
    pub fn record_reset_query_pool_host(&self, pool: vk::QueryPool, first: u32, count: u32) {
        for slot in first..first.saturating_add(count) {
            self.device()
                .set_query_state(QueryObject::new(pool, slot), QueryState::Reset);
        }
    }

    fn validate_query_slot(&self, cb: &CommandBuffer, pool: vk::QueryPool, slot: u32, loc: &Location, vuid: &str) -> bool {
        let Some(state) = self.device().query_pool(pool) else {
            return false;
        };
        if slot < state.info.query_count {
            return false;
        }
        self.log_error(
            vuid,
            &[cb.typed(), TypedHandle::new(pool)],
            loc,
            format!(
                "({}) is greater or equal to the queryCount ({}) of {}.",
                slot,
                state.info.query_count,
                TypedHandle::new(pool)
            ),
        )
    }

    fn validate_query_range(&self, cb: &CommandBuffer, pool: vk::QueryPool, first: u32, count: u32, loc: &Location) -> bool {
        let Some(state) = self.device().query_pool(pool) else {
            return false;
        };
        let total = state.info.query_count;
        if first >= total {
            return self.log_error(
                "VUID-vkCmdResetQueryPool-firstQuery-09436",
                &[cb.typed(), TypedHandle::new(pool)],
                &loc.dot("firstQuery"),
                format!("({}) is greater or equal to the queryCount ({}) of {}.", first, total, TypedHandle::new(pool)),
            );
        }
        if u64::from(first) + u64::from(count) > u64::from(total) {
            return self.log_error(
                "VUID-vkCmdResetQueryPool-firstQuery-09437",
                &[cb.typed(), TypedHandle::new(pool)],
                &loc.dot("firstQuery"),
                format!(
                    "({}) + queryCount ({}) is greater than the queryCount ({}) of {}.",
                    first,
                    count,
                    total,
                    TypedHandle::new(pool)
                ),
            );
        }
        false
    }
}
