/*!

# Robson rotation and screen indices

Candidates of a group are stored in the database with a fixed index, the
*database candidate index*. On the voting screen and on the printed paper
the order of the candidates inside each column is rotated to neutralize the
advantage of the first positions. The rotation printed on a paper is
identified by its *paper version*; version 0 means that no rotation applies.

A rotation has one position per seat of the electorate. The same rotation is
used for every column of the ballot: for a column of `n` candidates, the
rotation is *collapsed* by keeping only the slots lower than `n`, in order.

For example, with the rotation `[2, 0, 4, 1, 3]`:

| column size | collapsed rotation | screen order of the database indices |
|-------------|--------------------|--------------------------------------|
| 3           | `[2, 0, 1]`        | 2, 0, 1                              |
| 2           | `[0, 1]`           | 0, 1                                 |

The screen index of candidate `c` is the position of `c` in the collapsed
rotation. For the column of 3 above, candidate 0 is shown at index 1,
candidate 1 at index 2 and candidate 2 at index 0.

## Split groups

A group with more candidates than fit in one column is printed over several
columns. The database index of the candidate is first reduced to an index
local to the column containing it, the rotation is collapsed to the size of
that column, and the sizes of the preceding columns of the group are added
back to the result.

With a group of 4 candidates printed in columns of 3 and 1, candidate 3 is
the first (and only) candidate of the second column. Its local index is 0,
its screen index is `0 + 3 = 3`.

The sizes of the columns are described by the column split table: one row per
column of a split group except the last one, which receives the remaining
candidates. See [`crate::builder::LayoutBuilder`].

*/
