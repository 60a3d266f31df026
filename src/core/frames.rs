//! Per-effect frame handlers.
//!
//! Each handler reads the session and the frame, then pushes the matching
//! visual state into the compositor. Handlers never change what a session owns.
//! A destroyed node turns the handler into a no-op for that frame.

use std::f32::consts::PI;

use crate::backend::{Compositor, Container, NodeId, RotationAxis};
use crate::common::constants::*;
use crate::common::utils::{clamp_unit, interpolate_f32, opacity_u8};
use crate::core::easing::{cubic, overshoot, smooth_ramp};
use crate::core::session::{Direction, EffectKind, EffectSession};
use crate::core::timeline::Frame;

/// Apply `frame` of `session`.
pub fn apply(backend: &mut dyn Compositor, session: &EffectSession, frame: Frame) {
    match session.kind {
        EffectKind::Popup => popup(backend, session, frame),
        EffectKind::Fade => fade(backend, session, frame),
        EffectKind::Close => close(backend, session, frame),
        EffectKind::Notification => notification(backend, session, frame),
        EffectKind::Subview => subview(backend, session, frame),
        EffectKind::RotateScreen => rotate_screen(backend, session, frame),
        // Parked until the rotation blanks the screen
        EffectKind::CloseBeforeRotate => {}
    }
}

fn live_actor(backend: &dyn Compositor, node: Option<NodeId>) -> Option<NodeId> {
    node.filter(|&node| backend.node_is_valid(node))
}

fn popup(backend: &mut dyn Compositor, session: &EffectSession, frame: Frame) {
    let Some(actor) = live_actor(backend, session.primary_actor()) else {
        return;
    };
    let filler = session.auxiliary[0];

    // Windows often resize while they move, so measure every frame with the
    // filler taken out
    if let Some(filler) = filler
        && backend.parent_of(filler).is_some()
    {
        backend.remove_from_parent(filler);
    }
    let geo = backend.geometry(actor);
    let (_, screen_height) = backend.screen_size();

    let mut pop_top = geo.y == 0;
    let pop_bottom = geo.y + geo.height as i32 == screen_height as i32;
    if pop_top && pop_bottom {
        pop_top = false;
    }

    let amt = session.direction.apply(frame.progress());
    let bounce = overshoot(amt);

    let high = geo.y as f32;
    let low = if pop_top {
        -(geo.height as f32)
    } else if pop_bottom {
        (geo.y + geo.height as i32) as f32
    } else {
        high
    };
    let pos = interpolate_f32(low, high, bounce);

    backend.set_anchor(actor, 0.0, geo.y as f32 - pos);
    backend.set_opacity(actor, opacity_u8(amt));

    // Fill the gap left when the window has jumped a bit too far
    let Some(filler) = filler else {
        return;
    };
    if pop_top && pos > high {
        backend.add_to(Container::Node(actor), filler);
        backend.show(filler);
        backend.set_position(filler, 0.0, high - pos);
        backend.set_size(filler, geo.width as f32, pos - high);
    } else if pop_bottom && pos < high {
        backend.add_to(Container::Node(actor), filler);
        backend.show(filler);
        backend.set_position(filler, 0.0, geo.height as f32);
        backend.set_size(filler, geo.width as f32, high - pos);
    }
}

fn fade(backend: &mut dyn Compositor, session: &EffectSession, frame: Frame) {
    let Some(actor) = live_actor(backend, session.primary_actor()) else {
        return;
    };
    let amt = smooth_ramp(session.direction.apply(frame.progress()));
    backend.set_opacity(actor, opacity_u8(amt));
}

/// Fold up like a switched-off TV, then throw sparks.
fn close(backend: &mut dyn Compositor, session: &EffectSession, frame: Frame) {
    let Some(actor) = live_actor(backend, session.primary_actor()) else {
        return;
    };
    let amt = frame.progress();

    let fold = |v: f32| (1.0 - (clamp_unit(v) * PI).cos()) * 0.45 + 0.1;
    let amt_x = fold(1.6 - amt * 2.5);
    let amt_y = fold(1.0 - amt * 2.5);
    let amt_p = clamp_unit(amt * 2.0 - 1.0);

    let particle_opacity = (amt_p * PI).sin();
    let particle_radius = 8.0 + (1.0 - (amt_p * PI).cos()) * 32.0;
    let particle_scale = 1.0 - amt_p * 0.5;

    let (center_x, center_y) = session.geometry.center();

    // Anchored in the middle, so no repositioning needed
    backend.set_scale(actor, amt_x, amt_y);
    backend.set_opacity(actor, opacity_u8(1.0 - amt_p));

    let sparking = amt_p > 0.0 && amt_p < 1.0;
    for (i, spark) in session.auxiliary.iter().enumerate() {
        let Some(spark) = *spark else {
            continue;
        };
        if !sparking {
            backend.hide(spark);
            continue;
        }

        // Spaced semi-randomly, turning a quarter of a circle over the effect
        let i = i as f32;
        let angle = i * 15.0 + amt_p * PI / 2.0;
        let radius = particle_radius * (i + 1.0) / CLOSE_PARTICLES as f32;
        let twinkle = particle_opacity * ((1.0 - (amt * 50.0 + i).cos()) * 0.5);

        backend.show(spark);
        backend.set_opacity(spark, opacity_u8(twinkle));
        backend.set_scale(spark, particle_scale, particle_scale);
        backend.set_position(
            spark,
            center_x as f32 + angle.sin() * radius,
            center_y as f32 + angle.cos() * radius,
        );
    }
}

fn notification(backend: &mut dyn Compositor, session: &EffectSession, frame: Frame) {
    let Some(actor) = live_actor(backend, session.primary_actor()) else {
        return;
    };
    let geo = backend.geometry(actor);
    let width = geo.width.max(1) as f32;
    let height = geo.height.max(1) as f32;
    let now = frame.progress();

    match session.direction {
        Direction::Unmap => {
            let threshold = NOTIFICATION_MOVE_FRACTION;
            if now < threshold {
                // Shrink into the task button while fading to the target opacity
                let t = smooth_ramp(now / threshold);
                let corner_x = (NOTIFICATION_TARGET_X - geo.x as f32) * t;
                let corner_y = (NOTIFICATION_TARGET_Y - geo.y as f32) * t;
                let scale_x = (NOTIFICATION_TARGET_WIDTH / width - 1.0) * t + 1.0;
                let scale_y = (NOTIFICATION_TARGET_HEIGHT / height - 1.0) * t + 1.0;

                backend.set_scale(actor, scale_x, scale_y);
                backend.set_anchor(actor, -corner_x / scale_x, -corner_y / scale_y);
                backend.set_opacity(
                    actor,
                    opacity_u8(interpolate_f32(1.0, NOTIFICATION_TARGET_OPACITY, t)),
                );
            } else {
                let t = (now - threshold) / (1.0 - threshold);
                backend.set_opacity(
                    actor,
                    opacity_u8(interpolate_f32(NOTIFICATION_TARGET_OPACITY, 0.0, t)),
                );
            }
        }
        Direction::Map => {
            // Arc in from the top-right while shrinking to natural size
            let (screen_width, _) = backend.screen_size();
            let amt = smooth_ramp(now);
            let scale = 1.0 + (1.0 - amt) * 0.5;
            let angle = amt * PI * 0.5;
            let corner_x =
                (screen_width as f32 * 0.5 - TOP_LEFT_BUTTON_WIDTH as f32) * angle.cos();
            let corner_y = (angle.sin() - 1.0) * height;

            backend.set_opacity(actor, opacity_u8(amt));
            backend.set_scale(actor, scale, scale);
            backend.set_anchor(actor, -corner_x / scale, -corner_y / scale);
        }
    }
}

fn subview(backend: &mut dyn Compositor, session: &EffectSession, frame: Frame) {
    let subview_actor = live_actor(backend, session.primary_actor());
    let main_actor = live_actor(backend, session.secondary_actor());

    let amt = session.direction.apply(smooth_ramp(frame.progress()));
    let (screen_width, _) = backend.screen_size();
    let screen_width = screen_width as f32;
    let corner_x = (1.0 - amt) * screen_width;

    // Shown explicitly: the render manager's visibility pass would hide them
    if let Some(actor) = subview_actor {
        backend.set_anchor(actor, -corner_x, 0.0);
        backend.show(actor);
    }
    if let Some(actor) = main_actor {
        backend.set_anchor(actor, -(corner_x - screen_width), 0.0);
        backend.show(actor);
    }

    if frame.index != frame.total {
        return;
    }

    if let Some(actor) = subview_actor {
        backend.set_anchor(actor, 0.0, 0.0);
        if session.direction == Direction::Unmap {
            backend.hide(actor);
        }
    }
    if let Some(actor) = main_actor {
        backend.set_anchor(actor, 0.0, 0.0);
        if session.direction == Direction::Map {
            backend.hide(actor);
        }
    }
}

fn rotate_screen(backend: &mut dyn Compositor, session: &EffectSession, frame: Frame) {
    // Ease in, speeding up towards the end
    let amt = session.direction.apply(cubic(frame.progress()));
    // Only dim out right at the end
    let dim = (amt * 4.0 - 3.0).max(0.0);
    let angle = if frame.index < frame.total {
        session.angle * amt
    } else {
        0.0
    };

    let (screen_width, screen_height) = backend.screen_size();
    let axis = if backend.is_portrait() {
        RotationAxis::Y
    } else {
        RotationAxis::X
    };
    let root = backend.render_root();
    backend.set_rotation(
        root,
        axis,
        angle,
        (screen_width / 2) as f32,
        (screen_height / 2) as f32,
    );
    backend.set_depth(root, -amt * ROTATE_PUSHBACK_DEPTH);

    if let Some(dimmer) = live_actor(backend, session.auxiliary[0]) {
        backend.raise_top(dimmer);
        backend.set_opacity(dimmer, opacity_u8(dim));
    }
}

/// Keep a close effect's geometry in step with a screen that changed
/// orientation under it.
///
/// The actor is rotated back to the frame it was laid out for, and the
/// snapshot is transposed into the new screen coordinates.
pub fn follow_screen_size(backend: &mut dyn Compositor, session: &mut EffectSession) {
    let Some(previous) = session.screen_size else {
        return;
    };
    let (screen_width, screen_height) = backend.screen_size();
    if (screen_width, screen_height) == previous {
        return;
    }
    session.screen_size = Some((screen_width, screen_height));

    let was_landscape = previous.0 > previous.1;
    let is_landscape = screen_width > screen_height;
    if was_landscape == is_landscape {
        return;
    }

    let Some(actor) = live_actor(backend, session.primary_actor()) else {
        return;
    };
    let geo = &mut session.geometry;

    if is_landscape {
        // Portrait to landscape
        backend.set_rotation(actor, RotationAxis::Z, -90.0, 0.0, 0.0);
        let x = geo.x;
        geo.x = geo.y;
        geo.y = screen_height as i32 - (x + geo.width as i32);
    } else {
        // Landscape to portrait
        backend.set_rotation(actor, RotationAxis::Z, 90.0, 0.0, 0.0);
        let y = geo.y;
        geo.y = geo.x;
        geo.x = screen_width as i32 - (y + geo.height as i32);
    }
    std::mem::swap(&mut geo.width, &mut geo.height);

    let (center_x, center_y) = geo.center();
    backend.set_position(actor, center_x as f32, center_y as f32);
}
